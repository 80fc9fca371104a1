use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salondesk_core::{
    AppointmentId, ClientId, DomainError, DomainResult, Entity, ExpenseCategoryId, Money,
    MovementId, SessionId, StaffId,
};

/// Effect of a movement kind on the running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BalanceEffect {
    Increase,
    Decrease,
    /// Recorded for audit but excluded from the running balance.
    Neutral,
}

/// Kind of ledger movement.
///
/// The sign of a movement is never stored; it is derived from the kind via
/// [`MovementKind::balance_effect`], which is the single classification table
/// in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Opening,
    Closing,
    ClientPayment,
    SupplierPurchase,
    PositiveAdjustment,
    NegativeAdjustment,
    Withdrawal,
}

impl MovementKind {
    pub fn balance_effect(self) -> BalanceEffect {
        match self {
            MovementKind::Opening
            | MovementKind::ClientPayment
            | MovementKind::PositiveAdjustment => BalanceEffect::Increase,
            MovementKind::SupplierPurchase
            | MovementKind::NegativeAdjustment
            | MovementKind::Withdrawal => BalanceEffect::Decrease,
            MovementKind::Closing => BalanceEffect::Neutral,
        }
    }

    /// Opening and Closing entries are generated by the session lifecycle and
    /// cannot be recorded through the public movement path.
    pub fn is_system(self) -> bool {
        matches!(self, MovementKind::Opening | MovementKind::Closing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Opening => "opening",
            MovementKind::Closing => "closing",
            MovementKind::ClientPayment => "client_payment",
            MovementKind::SupplierPurchase => "supplier_purchase",
            MovementKind::PositiveAdjustment => "positive_adjustment",
            MovementKind::NegativeAdjustment => "negative_adjustment",
            MovementKind::Withdrawal => "withdrawal",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "opening" => Ok(MovementKind::Opening),
            "closing" => Ok(MovementKind::Closing),
            "client_payment" => Ok(MovementKind::ClientPayment),
            "supplier_purchase" => Ok(MovementKind::SupplierPurchase),
            "positive_adjustment" => Ok(MovementKind::PositiveAdjustment),
            "negative_adjustment" => Ok(MovementKind::NegativeAdjustment),
            "withdrawal" => Ok(MovementKind::Withdrawal),
            other => Err(DomainError::validation(format!(
                "unknown movement kind: {other:?}"
            ))),
        }
    }
}

/// How the money changed hands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(DomainError::validation(format!(
                "unknown payment method: {other:?}"
            ))),
        }
    }
}

/// Opaque references carried on a movement for reporting only.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRefs {
    pub client_id: Option<ClientId>,
    pub appointment_id: Option<AppointmentId>,
    pub supplier: Option<String>,
    pub expense_category_id: Option<ExpenseCategoryId>,
}

/// A single ledger entry. Append-only: never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub session_id: SessionId,
    pub kind: MovementKind,
    /// Always non-negative; the sign is derived from `kind`.
    pub amount: Money,
    /// Required except for system-generated Opening/Closing entries.
    pub description: Option<String>,
    pub payment_method: PaymentMethod,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: StaffId,
    #[serde(flatten)]
    pub refs: MovementRefs,
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Movement {
    /// Build a movement from a validated [`RecordMovement`] command.
    ///
    /// `recorded_at` is server-assigned; callers must have run
    /// [`RecordMovement::validate`] and bound `session_id` to the currently
    /// open session atomically with the insert.
    pub fn from_command(
        session_id: SessionId,
        cmd: RecordMovement,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            session_id,
            kind: cmd.kind,
            amount: cmd.amount,
            description: cmd.description,
            payment_method: cmd.payment_method,
            recorded_at,
            recorded_by: cmd.staff_id,
            refs: cmd.refs,
        }
    }

    /// Build a system-generated Opening or Closing entry.
    pub fn system(
        session_id: SessionId,
        kind: MovementKind,
        amount: Money,
        staff_id: StaffId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(kind.is_system());
        Self {
            id: MovementId::new(),
            session_id,
            kind,
            amount,
            description: None,
            payment_method: PaymentMethod::Cash,
            recorded_at,
            recorded_by: staff_id,
            refs: MovementRefs::default(),
        }
    }
}

/// Command: record a movement against the currently open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub kind: MovementKind,
    pub amount: Money,
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub staff_id: StaffId,
    #[serde(default)]
    pub refs: MovementRefs,
}

impl RecordMovement {
    pub fn validate(&self) -> DomainResult<()> {
        if self.kind.is_system() {
            return Err(DomainError::validation(
                "opening/closing entries are generated by the session lifecycle",
            ));
        }
        if !self.amount.is_positive() {
            return Err(DomainError::validation("amount must be positive"));
        }
        match &self.description {
            Some(d) if !d.trim().is_empty() => {}
            _ => return Err(DomainError::validation("description is required")),
        }
        // Payments must be attributable to a client.
        if self.kind == MovementKind::ClientPayment && self.refs.client_id.is_none() {
            return Err(DomainError::validation(
                "client_payment requires a client reference",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cmd(kind: MovementKind) -> RecordMovement {
        RecordMovement {
            kind,
            amount: Money::from_cents(50_000),
            description: Some("corte".to_string()),
            payment_method: PaymentMethod::Cash,
            staff_id: StaffId::new(),
            refs: MovementRefs {
                client_id: Some(ClientId::new()),
                ..MovementRefs::default()
            },
        }
    }

    #[test]
    fn classification_table_is_fixed() {
        use BalanceEffect::*;
        assert_eq!(MovementKind::Opening.balance_effect(), Increase);
        assert_eq!(MovementKind::ClientPayment.balance_effect(), Increase);
        assert_eq!(MovementKind::PositiveAdjustment.balance_effect(), Increase);
        assert_eq!(MovementKind::SupplierPurchase.balance_effect(), Decrease);
        assert_eq!(MovementKind::NegativeAdjustment.balance_effect(), Decrease);
        assert_eq!(MovementKind::Withdrawal.balance_effect(), Decrease);
        assert_eq!(MovementKind::Closing.balance_effect(), Neutral);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            MovementKind::Opening,
            MovementKind::Closing,
            MovementKind::ClientPayment,
            MovementKind::SupplierPurchase,
            MovementKind::PositiveAdjustment,
            MovementKind::NegativeAdjustment,
            MovementKind::Withdrawal,
        ] {
            assert_eq!(MovementKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(MovementKind::parse("venta").is_err());
    }

    #[test]
    fn valid_command_passes() {
        base_cmd(MovementKind::ClientPayment).validate().unwrap();
    }

    #[test]
    fn zero_or_negative_amount_is_rejected() {
        let mut cmd = base_cmd(MovementKind::Withdrawal);
        cmd.amount = Money::ZERO;
        assert!(matches!(
            cmd.validate().unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn missing_description_is_rejected() {
        let mut cmd = base_cmd(MovementKind::SupplierPurchase);
        cmd.description = Some("   ".to_string());
        assert!(cmd.validate().is_err());
        cmd.description = None;
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn client_payment_requires_client_ref() {
        let mut cmd = base_cmd(MovementKind::ClientPayment);
        cmd.refs.client_id = None;
        let err = cmd.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("client")));
    }

    #[test]
    fn system_kinds_cannot_use_public_path() {
        assert!(base_cmd(MovementKind::Opening).validate().is_err());
        assert!(base_cmd(MovementKind::Closing).validate().is_err());
    }
}
