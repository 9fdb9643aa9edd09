//! Policy evaluators.
//!
//! A [`Policy`] is a pure predicate over the caller and the requested
//! actions. Permissions combine one or more policies through a
//! [`DecisionStrategy`](crate::DecisionStrategy).
//!
//! # Example
//!
//! ```
//! use featguard_auth::{AuthzedAction, Policy, RoleBasedPolicy, User};
//!
//! let policy = RoleBasedPolicy::new(["reader"]);
//! let user = User::new("alice", ["reader"]);
//!
//! let decision = policy.validate_user(Some(&user), &[AuthzedAction::Read]);
//! assert!(decision.allowed);
//! ```

use std::fmt;

use serde::Serialize;

use crate::action::AuthzedAction;
use crate::principal::User;

// =============================================================================
// Policy Decision
// =============================================================================

/// Outcome of a single policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    /// Whether the policy grants access.
    pub allowed: bool,

    /// Optional explanation, typically set on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl PolicyDecision {
    /// An allowing decision without explanation.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            explanation: None,
        }
    }

    /// A denying decision with an explanation.
    #[must_use]
    pub fn deny(explanation: impl Into<String>) -> Self {
        Self {
            allowed: false,
            explanation: Some(explanation.into()),
        }
    }
}

// =============================================================================
// Policy Trait
// =============================================================================

/// An authorization predicate evaluated against the current caller.
///
/// Implementations must be side-effect free: no I/O, no interior state that
/// changes the outcome between calls with the same inputs.
pub trait Policy: Send + Sync + fmt::Debug {
    /// Decide whether `user` may perform `actions`.
    ///
    /// `user` is `None` for unauthenticated requests.
    fn validate_user(&self, user: Option<&User>, actions: &[AuthzedAction]) -> PolicyDecision;
}

// =============================================================================
// Built-in Policies
// =============================================================================

/// Grants every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowAll;

impl Policy for AllowAll {
    fn validate_user(&self, _user: Option<&User>, _actions: &[AuthzedAction]) -> PolicyDecision {
        PolicyDecision::allow()
    }
}

/// Grants access when the user holds any of the configured roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBasedPolicy {
    roles: Vec<String>,
}

impl RoleBasedPolicy {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl Policy for RoleBasedPolicy {
    fn validate_user(&self, user: Option<&User>, _actions: &[AuthzedAction]) -> PolicyDecision {
        match user {
            Some(user) if user.has_matching_role(&self.roles) => PolicyDecision::allow(),
            Some(user) => PolicyDecision::deny(format!(
                "Requires roles {:?}, user {} has {:?}",
                self.roles, user.username, user.roles
            )),
            None => PolicyDecision::deny(format!(
                "Requires roles {:?}, no authenticated user",
                self.roles
            )),
        }
    }
}

/// Grants access when the user belongs to any of the configured groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBasedPolicy {
    groups: Vec<String>,
}

impl GroupBasedPolicy {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}

impl Policy for GroupBasedPolicy {
    fn validate_user(&self, user: Option<&User>, _actions: &[AuthzedAction]) -> PolicyDecision {
        match user {
            Some(user) if user.has_matching_group(&self.groups) => PolicyDecision::allow(),
            Some(user) => PolicyDecision::deny(format!(
                "Requires groups {:?}, user {} is in {:?}",
                self.groups, user.username, user.groups
            )),
            None => PolicyDecision::deny(format!(
                "Requires groups {:?}, no authenticated user",
                self.groups
            )),
        }
    }
}

/// Grants access when the user belongs to any of the configured namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBasedPolicy {
    namespaces: Vec<String>,
}

impl NamespaceBasedPolicy {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }
}

impl Policy for NamespaceBasedPolicy {
    fn validate_user(&self, user: Option<&User>, _actions: &[AuthzedAction]) -> PolicyDecision {
        match user {
            Some(user) if user.has_matching_namespace(&self.namespaces) => PolicyDecision::allow(),
            Some(user) => PolicyDecision::deny(format!(
                "Requires namespaces {:?}, user {} is in {:?}",
                self.namespaces, user.username, user.namespaces
            )),
            None => PolicyDecision::deny(format!(
                "Requires namespaces {:?}, no authenticated user",
                self.namespaces
            )),
        }
    }
}
