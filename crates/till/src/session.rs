use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salondesk_core::{DomainError, DomainResult, Entity, Money, SessionId, StaffId};

/// Till session lifecycle. Open → Closed, exactly once; closed sessions are
/// terminal and only ever read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "open" => Ok(SessionStatus::Open),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(DomainError::validation(format!(
                "unknown session status: {other:?}"
            ))),
        }
    }
}

/// One till-opening period. At most one session is Open at any time,
/// system-wide; the storage layer enforces this atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub opened_at: DateTime<Utc>,
    pub opening_amount: Money,
    pub opened_by: StaffId,
    pub closed_at: Option<DateTime<Utc>>,
    pub closing_amount: Option<Money>,
    pub closed_by: Option<StaffId>,
    pub status: SessionStatus,
    pub notes: Option<String>,
}

impl Entity for Session {
    type Id = SessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Session {
    /// Create a new Open session from a validated [`OpenTill`] command.
    pub fn open(cmd: &OpenTill, opened_at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            opened_at,
            opening_amount: cmd.opening_amount,
            opened_by: cmd.staff_id,
            closed_at: None,
            closing_amount: None,
            closed_by: None,
            status: SessionStatus::Open,
            notes: cmd.notes.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Flip the session to Closed. This is the final mutation a session
    /// permits; a session that is not Open is no longer addressable as the
    /// current till and reads as not-found.
    pub fn close(
        &mut self,
        staff_id: StaffId,
        closing_amount: Money,
        notes: Option<String>,
        closed_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.is_open() {
            return Err(DomainError::not_found());
        }
        self.status = SessionStatus::Closed;
        self.closed_at = Some(closed_at);
        self.closing_amount = Some(closing_amount);
        self.closed_by = Some(staff_id);
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }
}

/// Command: open the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTill {
    pub opening_amount: Money,
    pub staff_id: StaffId,
    pub notes: Option<String>,
}

impl OpenTill {
    pub fn validate(&self) -> DomainResult<()> {
        if self.opening_amount.is_negative() {
            return Err(DomainError::validation(
                "opening amount must not be negative",
            ));
        }
        Ok(())
    }
}

/// Command: close the currently open till session.
///
/// The declared closing amount is recorded as-is; a mismatch against the
/// computed balance is surfaced as a discrepancy in the summary, never
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTill {
    pub session_id: SessionId,
    pub closing_amount: Money,
    pub staff_id: StaffId,
    pub notes: Option<String>,
}

impl CloseTill {
    pub fn validate(&self) -> DomainResult<()> {
        if self.closing_amount.is_negative() {
            return Err(DomainError::validation(
                "closing amount must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session() -> Session {
        let cmd = OpenTill {
            opening_amount: Money::from_cents(100_000),
            staff_id: StaffId::new(),
            notes: None,
        };
        cmd.validate().unwrap();
        Session::open(&cmd, Utc::now())
    }

    #[test]
    fn open_creates_an_open_session() {
        let s = open_session();
        assert!(s.is_open());
        assert_eq!(s.opening_amount, Money::from_cents(100_000));
        assert!(s.closed_at.is_none());
        assert!(s.closing_amount.is_none());
    }

    #[test]
    fn negative_opening_amount_is_rejected() {
        let cmd = OpenTill {
            opening_amount: Money::from_cents(-1),
            staff_id: StaffId::new(),
            notes: None,
        };
        assert!(matches!(
            cmd.validate().unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn close_transitions_exactly_once() {
        let mut s = open_session();
        let closer = StaffId::new();
        s.close(closer, Money::from_cents(125_000), Some("fin de turno".into()), Utc::now())
            .unwrap();

        assert_eq!(s.status, SessionStatus::Closed);
        assert_eq!(s.closed_by, Some(closer));
        assert_eq!(s.closing_amount, Some(Money::from_cents(125_000)));
        assert_eq!(s.notes.as_deref(), Some("fin de turno"));

        let err = s
            .close(closer, Money::from_cents(1), None, Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn close_keeps_opening_notes_when_none_given() {
        let cmd = OpenTill {
            opening_amount: Money::ZERO,
            staff_id: StaffId::new(),
            notes: Some("turno mañana".into()),
        };
        let mut s = Session::open(&cmd, Utc::now());
        s.close(StaffId::new(), Money::ZERO, None, Utc::now()).unwrap();
        assert_eq!(s.notes.as_deref(), Some("turno mañana"));
    }
}
