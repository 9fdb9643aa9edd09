//! Actions secured by the permission framework.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AuthzError;

/// Identifies the kind of action being secured, following CRUD and
/// online/offline store terminology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthzedAction {
    /// Wildcard: a permission granting `All` covers any requested action.
    All,
    Create,
    Read,
    Update,
    Delete,
    /// Query both the online and offline stores.
    Query,
    QueryOnline,
    QueryOffline,
    /// Write to any store.
    Write,
    WriteOnline,
    WriteOffline,
}

impl AuthzedAction {
    /// Every action, wildcard included.
    pub const VALUES: [AuthzedAction; 11] = [
        AuthzedAction::All,
        AuthzedAction::Create,
        AuthzedAction::Read,
        AuthzedAction::Update,
        AuthzedAction::Delete,
        AuthzedAction::Query,
        AuthzedAction::QueryOnline,
        AuthzedAction::QueryOffline,
        AuthzedAction::Write,
        AuthzedAction::WriteOnline,
        AuthzedAction::WriteOffline,
    ];

    /// Snake-case wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::QueryOnline => "query_online",
            Self::QueryOffline => "query_offline",
            Self::Write => "write",
            Self::WriteOnline => "write_online",
            Self::WriteOffline => "write_offline",
        }
    }
}

impl fmt::Display for AuthzedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthzedAction {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::VALUES
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| AuthzError::invalid_configuration(format!("Unknown action: {s}")))
    }
}

/// Formats an action list the way denial messages show it (`[READ, WRITE]`).
pub(crate) fn display_actions(actions: &[AuthzedAction]) -> String {
    let upper: Vec<String> = actions
        .iter()
        .map(|a| a.as_str().to_ascii_uppercase())
        .collect();
    format!("[{}]", upper.join(", "))
}
