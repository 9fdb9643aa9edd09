//! Permissions: which policies protect which actions on which resources.
//!
//! A [`Permission`] selects resources by kind, an optional name pattern and
//! optional required tags, lists the actions it covers and the policies that
//! decide them.
//!
//! # Example
//!
//! ```
//! use featguard_auth::{AuthzedAction, Permission, RoleBasedPolicy};
//! use featguard_core::{FeatureView, Resource, ResourceType};
//!
//! let permission = Permission::builder("readers")
//!     .types([ResourceType::FeatureView])
//!     .name_pattern("driver_.*")
//!     .actions([AuthzedAction::Read])
//!     .policy(RoleBasedPolicy::new(["reader"]))
//!     .build()
//!     .unwrap();
//!
//! let resource: Resource = FeatureView::new("driver_stats").into();
//! assert!(permission.match_resource(&resource));
//! assert!(permission.match_actions(&[AuthzedAction::Read]));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use featguard_core::{Resource, ResourceType};
use regex::Regex;

use crate::action::AuthzedAction;
use crate::decision::{self, DecisionEvaluator, DecisionStrategy};
use crate::policy::{AllowAll, Policy};
use crate::principal::User;
use crate::{AuthzError, AuthzResult};

// =============================================================================
// Permission
// =============================================================================

/// Immutable authorization rule, built once at startup.
#[derive(Debug, Clone)]
pub struct Permission {
    name: String,
    types: Vec<ResourceType>,
    with_subclasses: bool,
    name_pattern: Option<String>,
    name_regex: Option<Regex>,
    required_tags: Option<HashMap<String, String>>,
    actions: Vec<AuthzedAction>,
    policies: Vec<Arc<dyn Policy>>,
    decision_strategy: DecisionStrategy,
}

/// Outcome of evaluating a permission's policies for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    /// Whether the permission's policies grant access.
    pub granted: bool,

    /// Explanations from the denying policies.
    pub explanations: Vec<String>,
}

impl Permission {
    /// Start building a permission. `name` is used for diagnostics only and
    /// need not be unique.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PermissionBuilder {
        PermissionBuilder::new(name)
    }

    /// Permission over every type and action guarded by a single [`AllowAll`].
    #[must_use]
    pub fn allow_all(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: ResourceType::ALL.to_vec(),
            with_subclasses: false,
            name_pattern: None,
            name_regex: None,
            required_tags: None,
            actions: vec![AuthzedAction::All],
            policies: vec![Arc::new(AllowAll) as Arc<dyn Policy>],
            decision_strategy: DecisionStrategy::default(),
        }
    }

    /// See [`decision::global_decision_strategy`].
    #[must_use]
    pub fn global_decision_strategy() -> DecisionStrategy {
        decision::global_decision_strategy()
    }

    /// See [`decision::set_global_decision_strategy`].
    pub fn set_global_decision_strategy(strategy: DecisionStrategy) {
        decision::set_global_decision_strategy(strategy);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn types(&self) -> &[ResourceType] {
        &self.types
    }

    /// Recorded for registry round-trips. Type matching always accepts
    /// subtypes of the listed types.
    #[must_use]
    pub fn with_subclasses(&self) -> bool {
        self.with_subclasses
    }

    /// The trimmed name pattern, if any.
    #[must_use]
    pub fn name_pattern(&self) -> Option<&str> {
        self.name_pattern.as_deref()
    }

    /// The normalized required tags, if any.
    #[must_use]
    pub fn required_tags(&self) -> Option<&HashMap<String, String>> {
        self.required_tags.as_ref()
    }

    #[must_use]
    pub fn actions(&self) -> &[AuthzedAction] {
        &self.actions
    }

    #[must_use]
    pub fn policies(&self) -> &[Arc<dyn Policy>] {
        &self.policies
    }

    #[must_use]
    pub fn decision_strategy(&self) -> DecisionStrategy {
        self.decision_strategy
    }

    /// Check whether this permission applies to `resource`.
    ///
    /// An absent resource never matches. A resource whose kind lacks the
    /// name or tag capability required by a filter is reported and let
    /// through for that filter.
    pub fn match_resource<'a>(&self, resource: impl Into<Option<&'a Resource>>) -> bool {
        let Some(resource) = resource.into() else {
            tracing::warn!(permission = %self.name, "No resource passed to match_resource");
            return false;
        };

        let resource_type = resource.resource_type();
        if !self.matches_type(resource_type) {
            tracing::debug!(
                permission = %self.name,
                resource_type = %resource_type,
                expected = ?self.types,
                "Resource does not match any of the expected types"
            );
            return false;
        }

        self.matches_name(resource) && self.matches_tags(resource)
    }

    /// Check whether this permission covers every requested action.
    ///
    /// A permission granting [`AuthzedAction::All`] covers any request.
    #[must_use]
    pub fn match_actions(&self, requested: &[AuthzedAction]) -> bool {
        if self.actions.contains(&AuthzedAction::All) {
            return true;
        }
        requested.iter().all(|a| self.actions.contains(a))
    }

    /// Evaluate the policies, in order, with this permission's strategy.
    #[must_use]
    pub fn evaluate(&self, user: Option<&User>, actions: &[AuthzedAction]) -> PermissionGrant {
        let mut evaluator = DecisionEvaluator::new(self.decision_strategy, self.policies.len());
        for policy in &self.policies {
            let decision = policy.validate_user(user, actions);
            evaluator.add_grant(decision.allowed, decision.explanation);
            if evaluator.is_decided() {
                break;
            }
        }

        let (granted, explanations) = evaluator.decision();
        tracing::debug!(
            permission = %self.name,
            user = user.map(|u| u.username.as_str()).unwrap_or("<anonymous>"),
            granted,
            "Permission evaluated"
        );
        PermissionGrant {
            granted,
            explanations,
        }
    }

    fn matches_type(&self, resource_type: ResourceType) -> bool {
        self.types.iter().any(|t| resource_type.is_subtype_of(*t))
    }

    fn matches_name(&self, resource: &Resource) -> bool {
        let Some(ref regex) = self.name_regex else {
            return true;
        };

        let Some(name) = resource.name() else {
            tracing::warn!(
                permission = %self.name,
                resource_type = %resource.resource_type(),
                "Resource has no usable name, skipping name filter"
            );
            return true;
        };

        if regex.is_match(name) {
            return true;
        }
        tracing::debug!(
            permission = %self.name,
            resource_name = name,
            pattern = self.name_pattern.as_deref().unwrap_or_default(),
            "Resource name does not match pattern"
        );
        false
    }

    fn matches_tags(&self, resource: &Resource) -> bool {
        let Some(ref required_tags) = self.required_tags else {
            return true;
        };

        let Some(tagged) = resource.as_tagged() else {
            tracing::warn!(
                permission = %self.name,
                resource_type = %resource.resource_type(),
                "Resource has no tags attribute, skipping tags filter"
            );
            return true;
        };

        let tags = tagged.tags();
        for (key, required_value) in required_tags {
            let actual_value = tags.get(key);
            if actual_value != Some(required_value) {
                tracing::debug!(
                    permission = %self.name,
                    tag = %key,
                    expected = %required_value,
                    actual = ?actual_value,
                    "Unmatched tag value"
                );
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Permission Builder
// =============================================================================

/// Builder for [`Permission`]; validation happens in [`PermissionBuilder::build`].
#[derive(Debug, Clone)]
pub struct PermissionBuilder {
    name: String,
    types: Vec<ResourceType>,
    with_subclasses: bool,
    name_pattern: Option<String>,
    required_tags: Option<HashMap<String, String>>,
    actions: Vec<AuthzedAction>,
    policies: Option<Vec<Arc<dyn Policy>>>,
    decision_strategy: DecisionStrategy,
}

impl PermissionBuilder {
    /// Defaults: every managed type, `with_subclasses = false`, no name or tag
    /// filter, the `All` action, a single [`AllowAll`] policy, unanimous.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: ResourceType::ALL.to_vec(),
            with_subclasses: false,
            name_pattern: None,
            required_tags: None,
            actions: vec![AuthzedAction::All],
            policies: None,
            decision_strategy: DecisionStrategy::default(),
        }
    }

    /// Replace the protected resource types.
    #[must_use]
    pub fn types(mut self, types: impl IntoIterator<Item = ResourceType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    /// Set the recorded `with_subclasses` flag. Subtypes of the listed
    /// types match either way.
    #[must_use]
    pub fn with_subclasses(mut self, with_subclasses: bool) -> Self {
        self.with_subclasses = with_subclasses;
        self
    }

    /// Regex the whole resource name must match.
    #[must_use]
    pub fn name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    /// Tags the resource must carry with exactly these values.
    #[must_use]
    pub fn required_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.required_tags = Some(
            tags.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Replace the authorized actions.
    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = AuthzedAction>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    /// Append a policy. The first call replaces the default [`AllowAll`].
    #[must_use]
    pub fn policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policies
            .get_or_insert_with(Vec::new)
            .push(Arc::new(policy));
        self
    }

    /// Replace the policies with shared instances.
    #[must_use]
    pub fn policies(mut self, policies: impl IntoIterator<Item = Arc<dyn Policy>>) -> Self {
        self.policies = Some(policies.into_iter().collect());
        self
    }

    #[must_use]
    pub fn decision_strategy(mut self, strategy: DecisionStrategy) -> Self {
        self.decision_strategy = strategy;
        self
    }

    /// Validate and normalize the permission.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if types, actions or policies are
    /// empty, or if the name pattern is not a valid regex.
    pub fn build(self) -> AuthzResult<Permission> {
        if self.types.is_empty() {
            return Err(AuthzError::invalid_configuration(
                "The list 'types' must be non-empty.",
            ));
        }
        if self.actions.is_empty() {
            return Err(AuthzError::invalid_configuration(
                "The list 'actions' must be non-empty.",
            ));
        }
        let policies = match self.policies {
            Some(policies) if policies.is_empty() => {
                return Err(AuthzError::invalid_configuration(
                    "The list 'policies' must be non-empty.",
                ));
            }
            Some(policies) => policies,
            None => vec![Arc::new(AllowAll) as Arc<dyn Policy>],
        };

        let name_pattern = self.name_pattern.map(|p| p.trim().to_string());
        let name_regex = name_pattern
            .as_deref()
            .map(|p| {
                Regex::new(&format!("^(?:{p})$")).map_err(|e| {
                    AuthzError::invalid_configuration(format!(
                        "Invalid name pattern '{p}' in permission {}: {e}",
                        self.name
                    ))
                })
            })
            .transpose()?;

        let required_tags = self.required_tags.and_then(normalize_required_tags);

        Ok(Permission {
            name: self.name,
            types: self.types,
            with_subclasses: self.with_subclasses,
            name_pattern,
            name_regex,
            required_tags,
            actions: self.actions,
            policies,
            decision_strategy: self.decision_strategy,
        })
    }
}

fn normalize_required_tags(tags: HashMap<String, String>) -> Option<HashMap<String, String>> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.into_iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect(),
    )
}
