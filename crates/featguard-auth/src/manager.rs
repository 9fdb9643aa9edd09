//! Security manager: the entry point server handlers call per request.
//!
//! The manager holds the project's permissions behind an [`ArcSwap`] so that
//! request threads read a consistent snapshot without locking while a reload
//! swaps in a new list.
//!
//! # Decision flow
//!
//! For each resource:
//!
//! 1. Select the permissions whose resource filter and actions both match
//! 2. Evaluate each selected permission's policies with its own strategy
//! 3. Combine the per-permission outcomes with the cross-permission strategy
//!    (type override, then manager override, then the global default)
//! 4. No matching permission means deny
//!
//! # Example
//!
//! ```
//! use featguard_auth::{AuthzedAction, Permission, RoleBasedPolicy, SecurityManager, User};
//! use featguard_core::{FeatureView, Resource, ResourceType};
//!
//! let manager = SecurityManager::new(
//!     "driver_ranking",
//!     vec![
//!         Permission::builder("readers")
//!             .types([ResourceType::FeatureView])
//!             .actions([AuthzedAction::Read])
//!             .policy(RoleBasedPolicy::new(["reader"]))
//!             .build()
//!             .unwrap(),
//!     ],
//! );
//!
//! let reader = User::new("r", ["reader"]);
//! let view: Resource = FeatureView::new("driver_stats").into();
//! let view = manager
//!     .assert_permissions_for(Some(&reader), view, &[AuthzedAction::Read])
//!     .unwrap();
//! assert_eq!(view.name(), Some("driver_stats"));
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use featguard_core::{Resource, ResourceType};

use crate::action::{AuthzedAction, display_actions};
use crate::context;
use crate::decision::{self, DecisionEvaluator, DecisionStrategy};
use crate::permission::{Permission, PermissionGrant};
use crate::principal::User;
use crate::registry::PermissionRegistry;
use crate::{AuthzError, AuthzResult};

// =============================================================================
// Security Manager
// =============================================================================

/// Filters and asserts access to resources for the current caller.
pub struct SecurityManager {
    /// Project whose permissions are enforced.
    project: String,

    /// Registry the permissions are (re)loaded from, if any.
    registry: Option<Arc<dyn PermissionRegistry>>,

    /// Current permission snapshot (copy-on-write).
    permissions: ArcSwap<Vec<Permission>>,

    /// Cross-permission strategy; `None` defers to the global default.
    decision_strategy: Option<DecisionStrategy>,

    /// Cross-permission strategy per resource type.
    type_strategies: HashMap<ResourceType, DecisionStrategy>,
}

impl fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityManager")
            .field("project", &self.project)
            .field("permissions", &self.permissions.load().len())
            .field("registry", &self.registry.is_some())
            .field("decision_strategy", &self.decision_strategy)
            .field("type_strategies", &self.type_strategies)
            .finish()
    }
}

impl SecurityManager {
    /// Create a manager over a fixed permission list.
    #[must_use]
    pub fn new(project: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            project: project.into(),
            registry: None,
            permissions: ArcSwap::from_pointee(permissions),
            decision_strategy: None,
            type_strategies: HashMap::new(),
        }
    }

    /// Create a manager backed by `registry`, loading the current permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub async fn from_registry(
        project: impl Into<String>,
        registry: Arc<dyn PermissionRegistry>,
    ) -> AuthzResult<Self> {
        let project = project.into();
        let permissions = registry.list_permissions(&project).await?;
        tracing::info!(
            project = %project,
            permissions = permissions.len(),
            "Security manager initialized from registry"
        );
        Ok(Self {
            project,
            registry: Some(registry),
            permissions: ArcSwap::from_pointee(permissions),
            decision_strategy: None,
            type_strategies: HashMap::new(),
        })
    }

    /// Use `strategy` to combine matching permissions instead of the global default.
    #[must_use]
    pub fn with_decision_strategy(mut self, strategy: DecisionStrategy) -> Self {
        self.decision_strategy = Some(strategy);
        self
    }

    /// Use `strategy` to combine matching permissions for resources of `resource_type`.
    #[must_use]
    pub fn with_type_strategy(
        mut self,
        resource_type: ResourceType,
        strategy: DecisionStrategy,
    ) -> Self {
        self.type_strategies.insert(resource_type, strategy);
        self
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Snapshot of the active permissions.
    #[must_use]
    pub fn permissions(&self) -> Arc<Vec<Permission>> {
        self.permissions.load_full()
    }

    /// Atomically replace the active permissions.
    pub fn replace_permissions(&self, permissions: Vec<Permission>) {
        tracing::info!(
            project = %self.project,
            permissions = permissions.len(),
            "Replacing permissions"
        );
        self.permissions.store(Arc::new(permissions));
    }

    /// Reload the permissions from the registry.
    ///
    /// Returns the number of permissions now active.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has no registry or the registry read
    /// fails; the previous snapshot stays active in that case.
    pub async fn refresh(&self) -> AuthzResult<usize> {
        let registry = self.registry.as_ref().ok_or_else(|| {
            AuthzError::internal("Security manager has no permission registry to refresh from")
        })?;
        let permissions = registry.list_permissions(&self.project).await?;
        let count = permissions.len();
        self.replace_permissions(permissions);
        Ok(count)
    }

    /// Strategy combining matching permissions for `resource_type`.
    #[must_use]
    pub fn decision_strategy_for(&self, resource_type: ResourceType) -> DecisionStrategy {
        self.type_strategies
            .get(&resource_type)
            .copied()
            .or(self.decision_strategy)
            .unwrap_or_else(decision::global_decision_strategy)
    }

    /// The principal of the enclosing request scope.
    #[must_use]
    pub fn current_user(&self) -> Option<Arc<User>> {
        context::current_user()
    }

    /// Evaluate access to one resource without raising.
    #[must_use]
    pub fn check(
        &self,
        user: Option<&User>,
        resource: &Resource,
        actions: &[AuthzedAction],
    ) -> PermissionGrant {
        let permissions = self.permissions.load();
        if permissions.is_empty() {
            tracing::debug!(project = %self.project, "No permissions configured, access granted");
            return PermissionGrant {
                granted: true,
                explanations: Vec::new(),
            };
        }

        let matching: Vec<&Permission> = permissions
            .iter()
            .filter(|p| p.match_resource(resource) && p.match_actions(actions))
            .collect();

        let resource_type = resource.resource_type();
        if matching.is_empty() {
            tracing::debug!(
                resource_type = %resource_type,
                resource_name = resource.name().unwrap_or_default(),
                "No permission matches the resource"
            );
            return PermissionGrant {
                granted: false,
                explanations: vec!["No permission matches the resource and actions".to_string()],
            };
        }

        let strategy = self.decision_strategy_for(resource_type);
        let mut evaluator = DecisionEvaluator::new(strategy, matching.len());
        for permission in matching {
            let grant = permission.evaluate(user, actions);
            let explanation = (!grant.granted).then(|| {
                format!(
                    "Permission {} denied access: {}",
                    permission.name(),
                    grant.explanations.join("; ")
                )
            });
            evaluator.add_grant(grant.granted, explanation);
            if evaluator.is_decided() {
                break;
            }
        }

        let (granted, explanations) = evaluator.decision();
        PermissionGrant {
            granted,
            explanations,
        }
    }

    /// Keep the resources the current user may perform `actions` on.
    pub fn permitted_resources<R, I>(&self, resources: I, actions: &[AuthzedAction]) -> Vec<R>
    where
        R: Borrow<Resource>,
        I: IntoIterator<Item = R>,
    {
        let user = self.current_user();
        self.permitted_resources_for(user.as_deref(), resources, actions)
    }

    /// Keep the resources `user` may perform `actions` on, in input order.
    pub fn permitted_resources_for<R, I>(
        &self,
        user: Option<&User>,
        resources: I,
        actions: &[AuthzedAction],
    ) -> Vec<R>
    where
        R: Borrow<Resource>,
        I: IntoIterator<Item = R>,
    {
        let permitted: Vec<R> = resources
            .into_iter()
            .filter(|r| self.check(user, r.borrow(), actions).granted)
            .collect();
        tracing::debug!(
            project = %self.project,
            actions = %display_actions(actions),
            permitted = permitted.len(),
            "Filtered resources"
        );
        permitted
    }

    /// Return `resource` unchanged if the current user may perform `actions`.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::PermissionDenied` otherwise.
    pub fn assert_permissions<R>(&self, resource: R, actions: &[AuthzedAction]) -> AuthzResult<R>
    where
        R: Borrow<Resource>,
    {
        let user = self.current_user();
        self.assert_permissions_for(user.as_deref(), resource, actions)
    }

    /// Return `resource` unchanged if `user` may perform `actions`.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::PermissionDenied` otherwise.
    pub fn assert_permissions_for<R>(
        &self,
        user: Option<&User>,
        resource: R,
        actions: &[AuthzedAction],
    ) -> AuthzResult<R>
    where
        R: Borrow<Resource>,
    {
        let grant = self.check(user, resource.borrow(), actions);
        if grant.granted {
            return Ok(resource);
        }

        let target = resource.borrow();
        let message = format!(
            "{} on {}:{} denied to {}: {}",
            display_actions(actions),
            target.resource_type(),
            target.name().unwrap_or("<unnamed>"),
            user.map(|u| u.username.as_str()).unwrap_or("<anonymous>"),
            grant.explanations.join("; ")
        );
        tracing::info!(project = %self.project, reason = %message, "Access denied");
        Err(AuthzError::permission_denied(message))
    }
}

/// A manager that lets everything through: one permission over all types
/// and actions protected by [`AllowAll`](crate::AllowAll).
#[must_use]
pub fn no_security_manager() -> SecurityManager {
    tracing::info!("Authorization disabled, installing pass-through security manager");
    SecurityManager::new("", vec![Permission::allow_all("allow-all")])
        .with_decision_strategy(DecisionStrategy::Unanimous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RoleBasedPolicy;
    use crate::registry::InMemoryRegistry;
    use featguard_core::{BatchFeatureView, Entity, FeatureView, ValidationReference};

    fn feature_views() -> Vec<Resource> {
        vec![
            FeatureView::new("secured").into(),
            FeatureView::new("special-secured").into(),
        ]
    }

    fn permission(name: &str, roles: &[&str], actions: &[AuthzedAction]) -> Permission {
        Permission::builder(name)
            .types([ResourceType::FeatureView])
            .actions(actions.iter().copied())
            .policy(RoleBasedPolicy::new(roles.iter().copied()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_no_matching_permission_excludes_resource() {
        let manager = SecurityManager::new(
            "p",
            vec![permission("reader", &["reader"], &[AuthzedAction::Read])],
        )
        .with_decision_strategy(DecisionStrategy::Unanimous);
        let user = User::new("r", ["reader"]);

        let entity: Resource = Entity::new("driver").into();
        let permitted = manager.permitted_resources_for(Some(&user), [&entity], &[AuthzedAction::Read]);
        assert!(permitted.is_empty());

        let err = manager
            .assert_permissions_for(Some(&user), &entity, &[AuthzedAction::Read])
            .unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_empty_permission_list_allows_everything() {
        let manager = SecurityManager::new("p", Vec::new());
        let resources = feature_views();
        let permitted = manager.permitted_resources_for(None, &resources, &[AuthzedAction::Delete]);
        assert_eq!(permitted.len(), 2);
    }

    #[test]
    fn test_filter_preserves_order_and_identity() {
        let manager = SecurityManager::new(
            "p",
            vec![
                Permission::builder("odd")
                    .name_pattern("fv[13]")
                    .build()
                    .unwrap(),
            ],
        )
        .with_decision_strategy(DecisionStrategy::Unanimous);

        let resources: Vec<Resource> = (0..5)
            .map(|i| FeatureView::new(format!("fv{i}")).into())
            .collect();
        let permitted = manager.permitted_resources_for(None, &resources, &[AuthzedAction::Read]);
        assert_eq!(permitted.len(), 2);
        assert!(std::ptr::eq(permitted[0], &resources[1]));
        assert!(std::ptr::eq(permitted[1], &resources[3]));
    }

    #[test]
    fn test_assert_returns_same_value() {
        let manager = no_security_manager();
        let resource: Resource = FeatureView::new("fv").with_tag("team", "x").into();
        let expected = resource.clone();
        let returned = manager
            .assert_permissions_for(None, resource, &[AuthzedAction::Write])
            .unwrap();
        assert_eq!(returned, expected);

        let shared = Arc::new(expected);
        let returned = manager
            .assert_permissions_for(None, Arc::clone(&shared), &[AuthzedAction::Read])
            .unwrap();
        assert!(Arc::ptr_eq(&returned, &shared));
    }

    #[test]
    fn test_pass_through_manager() {
        let manager = no_security_manager();
        let resources: Vec<Resource> = vec![
            Entity::new("driver").into(),
            ValidationReference::new("ref", "ds").into(),
            BatchFeatureView::new("bfv").into(),
        ];
        let permitted = manager.permitted_resources_for(
            None,
            resources.clone(),
            &[AuthzedAction::Query, AuthzedAction::WriteOffline],
        );
        assert_eq!(permitted, resources);
    }

    #[test]
    fn test_cross_permission_unanimous_vs_affirmative() {
        let permissions = vec![
            permission("reader", &["reader"], &[AuthzedAction::Read]),
            permission("auditor", &["auditor"], &[AuthzedAction::Read]),
        ];
        let user = User::new("r", ["reader"]);
        let resource: Resource = FeatureView::new("fv").into();

        let unanimous = SecurityManager::new("p", permissions.clone())
            .with_decision_strategy(DecisionStrategy::Unanimous);
        assert!(!unanimous.check(Some(&user), &resource, &[AuthzedAction::Read]).granted);

        let affirmative = SecurityManager::new("p", permissions)
            .with_decision_strategy(DecisionStrategy::Affirmative);
        assert!(affirmative.check(Some(&user), &resource, &[AuthzedAction::Read]).granted);
    }

    #[test]
    fn test_type_strategy_override() {
        let permissions = vec![
            Permission::builder("reader")
                .actions([AuthzedAction::Read])
                .policy(RoleBasedPolicy::new(["reader"]))
                .build()
                .unwrap(),
            Permission::builder("auditor")
                .actions([AuthzedAction::Read])
                .policy(RoleBasedPolicy::new(["auditor"]))
                .build()
                .unwrap(),
        ];
        let manager = SecurityManager::new("p", permissions)
            .with_decision_strategy(DecisionStrategy::Unanimous)
            .with_type_strategy(ResourceType::Entity, DecisionStrategy::Affirmative);
        let user = User::new("r", ["reader"]);

        let entity: Resource = Entity::new("driver").into();
        let view: Resource = FeatureView::new("fv").into();
        assert!(manager.check(Some(&user), &entity, &[AuthzedAction::Read]).granted);
        assert!(!manager.check(Some(&user), &view, &[AuthzedAction::Read]).granted);
        assert_eq!(
            manager.decision_strategy_for(ResourceType::Entity),
            DecisionStrategy::Affirmative
        );
    }

    #[test]
    fn test_denial_message() {
        let manager = SecurityManager::new(
            "p",
            vec![permission("writer", &["writer"], &[AuthzedAction::Write])],
        )
        .with_decision_strategy(DecisionStrategy::Unanimous);
        let user = User::new("r", ["reader"]);
        let resource: Resource = FeatureView::new("secured").into();

        let err = manager
            .assert_permissions_for(Some(&user), &resource, &[AuthzedAction::Write])
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("[WRITE]"));
        assert!(message.contains("feature_view:secured"));
        assert!(message.contains("denied to r"));
        assert!(message.contains("Permission writer denied access"));
    }

    #[test]
    fn test_uses_current_user_scope() {
        let manager = SecurityManager::new(
            "p",
            vec![permission("reader", &["reader"], &[AuthzedAction::Read])],
        )
        .with_decision_strategy(DecisionStrategy::Unanimous);
        let resources = feature_views();

        let permitted = context::with_current_user_sync(Some(User::new("r", ["reader"])), || {
            manager.permitted_resources(&resources, &[AuthzedAction::Read]).len()
        });
        assert_eq!(permitted, 2);

        let permitted = context::with_current_user_sync(Some(User::new("w", ["writer"])), || {
            manager.permitted_resources(&resources, &[AuthzedAction::Read]).len()
        });
        assert_eq!(permitted, 0);

        assert!(manager.permitted_resources(&resources, &[AuthzedAction::Read]).is_empty());
    }

    #[test]
    fn test_replace_permissions() {
        let manager = SecurityManager::new("p", vec![permission("reader", &["reader"], &[AuthzedAction::Read])])
            .with_decision_strategy(DecisionStrategy::Unanimous);
        let user = User::new("w", ["writer"]);
        let resource: Resource = FeatureView::new("fv").into();
        assert!(!manager.check(Some(&user), &resource, &[AuthzedAction::Read]).granted);

        manager.replace_permissions(vec![permission("writer", &["writer"], &[AuthzedAction::Read])]);
        assert_eq!(manager.permissions().len(), 1);
        assert!(manager.check(Some(&user), &resource, &[AuthzedAction::Read]).granted);
    }

    #[tokio::test]
    async fn test_refresh_from_registry() {
        let registry = Arc::new(InMemoryRegistry::with_permissions(
            "p",
            vec![permission("reader", &["reader"], &[AuthzedAction::Read])],
        ));
        let manager = SecurityManager::from_registry("p", registry.clone())
            .await
            .unwrap();
        assert_eq!(manager.permissions().len(), 1);

        registry.apply_permission("p", permission("writer", &["writer"], &[AuthzedAction::Write]));
        assert_eq!(manager.refresh().await.unwrap(), 2);
        assert_eq!(manager.permissions().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_without_registry_fails() {
        let manager = SecurityManager::new("p", Vec::new());
        assert!(manager.refresh().await.is_err());
    }
}
