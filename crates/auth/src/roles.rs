use serde::{Deserialize, Serialize};

/// Role granted to a staff member (e.g. "admin", "stylist").
///
/// The till does not gate operations per role; roles are carried for audit
/// and for the surrounding application's UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
