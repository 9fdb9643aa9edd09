//! The authenticated caller.

use serde::{Deserialize, Serialize};

/// Identity resolved by the token parser for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Username or service account name.
    pub username: String,

    /// Assigned roles.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Namespaces the user belongs to.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl User {
    /// Create a user with the given roles.
    pub fn new<I, S>(username: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if the user holds any of the requested roles.
    #[must_use]
    pub fn has_matching_role(&self, requested: &[String]) -> bool {
        requested.iter().any(|r| self.roles.contains(r))
    }

    /// Returns `true` if the user belongs to any of the requested groups.
    #[must_use]
    pub fn has_matching_group(&self, requested: &[String]) -> bool {
        requested.iter().any(|g| self.groups.contains(g))
    }

    /// Returns `true` if the user belongs to any of the requested namespaces.
    #[must_use]
    pub fn has_matching_namespace(&self, requested: &[String]) -> bool {
        requested.iter().any(|n| self.namespaces.contains(n))
    }
}
