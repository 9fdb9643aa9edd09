//! Server bootstrap: picks the security manager matching the configured
//! authentication type.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::AuthzConfig;
use crate::manager::{SecurityManager, no_security_manager};
use crate::registry::{InMemoryRegistry, PermissionRegistry};
use crate::reload::{PermissionChangeNotifier, PermissionReloadService};
use crate::{AuthzError, AuthzResult};

/// Authentication type configured for the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Authorization disabled.
    #[default]
    #[serde(rename = "no_auth")]
    None,
    Kubernetes,
    Oidc,
}

impl AuthType {
    /// Parse `value`, falling back to [`AuthType::None`] for unknown values.
    #[must_use]
    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(auth_type = value, "Unknown auth type, disabling authorization");
            Self::None
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "no_auth",
            Self::Kubernetes => "kubernetes",
            Self::Oidc => "oidc",
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_auth" | "none" => Ok(Self::None),
            "kubernetes" => Ok(Self::Kubernetes),
            "oidc" => Ok(Self::Oidc),
            other => Err(AuthzError::invalid_configuration(format!(
                "Unknown auth type '{other}'"
            ))),
        }
    }
}

/// Build the security manager for `auth_type`.
///
/// Disabled authorization yields the pass-through manager; any other type
/// loads the project's permissions from `registry`.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub async fn init_security_manager(
    auth_type: AuthType,
    project: &str,
    registry: Arc<dyn PermissionRegistry>,
) -> AuthzResult<SecurityManager> {
    tracing::info!(auth_type = %auth_type, project, "Initializing security manager");
    if !auth_type.is_enabled() {
        return Ok(no_security_manager());
    }
    SecurityManager::from_registry(project, registry).await
}

/// Build the security manager described by `config`.
///
/// The configured permissions are loaded into an in-memory registry so the
/// manager can be refreshed later.
///
/// # Errors
///
/// Returns `InvalidConfiguration` if a permission or strategy override is
/// invalid.
pub async fn init_from_config(config: &AuthzConfig) -> AuthzResult<SecurityManager> {
    let (_, _, manager) = build_from_config(config).await?;
    Ok(manager)
}

async fn build_from_config(
    config: &AuthzConfig,
) -> AuthzResult<(AuthType, Arc<InMemoryRegistry>, SecurityManager)> {
    let auth_type = AuthType::from_str_lossy(&config.auth.auth_type);
    let registry = Arc::new(InMemoryRegistry::with_permissions(
        config.project.clone(),
        config.build_permissions()?,
    ));
    let type_strategies = config.type_strategies()?;

    let mut manager = init_security_manager(auth_type, &config.project, registry.clone()).await?;
    if !auth_type.is_enabled() {
        return Ok((auth_type, registry, manager));
    }

    if let Some(strategy) = config.decision_strategy {
        manager = manager.with_decision_strategy(strategy);
    }
    for (resource_type, strategy) in type_strategies {
        manager = manager.with_type_strategy(resource_type, strategy);
    }
    Ok((auth_type, registry, manager))
}

// =============================================================================
// Running Services
// =============================================================================

/// Authorization services started by [`start_from_config`].
pub struct AuthzServices {
    /// Manager shared by request handlers.
    pub manager: Arc<SecurityManager>,

    /// Registry holding the project's permissions. Announce edits through
    /// [`notifier`](Self::notifier) so the reload service picks them up.
    pub registry: Arc<InMemoryRegistry>,

    pub notifier: Arc<PermissionChangeNotifier>,

    reload: Option<(Arc<PermissionReloadService>, JoinHandle<()>)>,
}

impl AuthzServices {
    /// The running reload service, if `[reload]` enabled it.
    #[must_use]
    pub fn reload_service(&self) -> Option<&Arc<PermissionReloadService>> {
        self.reload.as_ref().map(|(service, _)| service)
    }

    /// Stop the reload service and wait for its task to finish.
    pub async fn shutdown(self) {
        let Some((service, task)) = self.reload else {
            return;
        };
        service.shutdown();
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Permission reload task ended abnormally");
        }
    }
}

impl fmt::Debug for AuthzServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthzServices")
            .field("manager", &self.manager)
            .field("subscribers", &self.notifier.subscriber_count())
            .field("reload_running", &self.reload.is_some())
            .finish()
    }
}

/// Build the security manager described by `config` and, when
/// `reload.enabled` is set and authorization is on, spawn the permission
/// reload service on the current tokio runtime.
///
/// # Errors
///
/// Returns `InvalidConfiguration` if a permission or strategy override is
/// invalid.
pub async fn start_from_config(config: &AuthzConfig) -> AuthzResult<AuthzServices> {
    let (auth_type, registry, manager) = build_from_config(config).await?;
    let manager = Arc::new(manager);
    let notifier = Arc::new(PermissionChangeNotifier::default());

    let reload = if config.reload.enabled && auth_type.is_enabled() {
        let service = Arc::new(PermissionReloadService::new(
            manager.clone(),
            notifier.clone(),
            config.reload.to_reload_config(),
        ));
        let task = tokio::spawn({
            let service = service.clone();
            async move { service.run().await }
        });
        tracing::info!(project = %config.project, "Permission reload service started");
        Some((service, task))
    } else {
        tracing::debug!(
            project = %config.project,
            enabled = config.reload.enabled,
            auth_type = %auth_type,
            "Permission reload service not started"
        );
        None
    };

    Ok(AuthzServices {
        manager,
        registry,
        notifier,
        reload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthzedAction, DecisionStrategy, Permission};
    use featguard_core::{FeatureView, Resource, ResourceType};

    #[test]
    fn test_auth_type_parsing() {
        assert_eq!(AuthType::from_str_lossy("oidc"), AuthType::Oidc);
        assert_eq!(AuthType::from_str_lossy(" Kubernetes "), AuthType::Kubernetes);
        assert_eq!(AuthType::from_str_lossy("no_auth"), AuthType::None);
        assert_eq!(AuthType::from_str_lossy("ldap"), AuthType::None);
        assert!(AuthType::from_str("ldap").unwrap_err().is_configuration_error());
        assert_eq!(AuthType::Oidc.to_string(), "oidc");
    }

    #[tokio::test]
    async fn test_no_auth_is_pass_through() {
        let registry = Arc::new(InMemoryRegistry::with_permissions(
            "p",
            vec![
                Permission::builder("nobody")
                    .types([ResourceType::FeatureView])
                    .actions([AuthzedAction::Read])
                    .build()
                    .unwrap(),
            ],
        ));
        let manager = init_security_manager(AuthType::None, "p", registry)
            .await
            .unwrap();
        let resource: Resource = FeatureView::new("fv").into();
        assert!(manager.assert_permissions_for(None, &resource, &[AuthzedAction::Delete]).is_ok());
    }

    #[tokio::test]
    async fn test_enabled_auth_loads_registry() {
        let registry = Arc::new(InMemoryRegistry::with_permissions(
            "p",
            vec![Permission::builder("a").build().unwrap()],
        ));
        let manager = init_security_manager(AuthType::Kubernetes, "p", registry)
            .await
            .unwrap();
        assert_eq!(manager.project(), "p");
        assert_eq!(manager.permissions().len(), 1);
    }

    #[tokio::test]
    async fn test_init_from_config_applies_strategies() {
        let config = AuthzConfig::from_toml_str(
            r#"
project = "p"
decision_strategy = "affirmative"

[auth]
type = "oidc"

[type_strategies]
entity = "unanimous"

[[permissions]]
name = "all"
"#,
        )
        .unwrap();
        let manager = init_from_config(&config).await.unwrap();
        assert_eq!(manager.permissions().len(), 1);
        assert_eq!(
            manager.decision_strategy_for(ResourceType::FeatureView),
            DecisionStrategy::Affirmative
        );
        assert_eq!(
            manager.decision_strategy_for(ResourceType::Entity),
            DecisionStrategy::Unanimous
        );
        assert!(manager.refresh().await.is_ok());
    }

    const RELOADING_CONFIG: &str = r#"
project = "p"

[auth]
type = "kubernetes"

[reload]
debounce = "10ms"
initial_backoff = "10ms"

[[permissions]]
name = "readers"
types = ["feature_view"]
actions = ["read"]

[[permissions.policies]]
type = "role_based"
roles = ["reader"]
"#;

    #[tokio::test]
    async fn test_start_from_config_applies_registry_changes() {
        let config = AuthzConfig::from_toml_str(RELOADING_CONFIG).unwrap();
        let services = start_from_config(&config).await.unwrap();
        assert!(services.reload_service().is_some());

        let writer = crate::User::new("w", ["writer"]);
        let resource: Resource = FeatureView::new("fv").into();
        let write = [AuthzedAction::Write];
        assert!(!services.manager.check(Some(&writer), &resource, &write).granted);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        services.registry.apply_permission(
            "p",
            Permission::builder("writers")
                .types([ResourceType::FeatureView])
                .actions([AuthzedAction::Write])
                .policy(crate::RoleBasedPolicy::new(["writer"]))
                .build()
                .unwrap(),
        );
        services.notifier.notify(crate::PermissionChange::Applied {
            name: "writers".to_string(),
        });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(services.manager.permissions().len(), 2);
        assert!(services.manager.check(Some(&writer), &resource, &write).granted);
        services.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_from_config_without_reload() {
        let disabled = RELOADING_CONFIG.replace("[reload]", "[reload]\nenabled = false");
        let config = AuthzConfig::from_toml_str(&disabled).unwrap();
        let services = start_from_config(&config).await.unwrap();
        assert!(services.reload_service().is_none());
        assert_eq!(services.manager.permissions().len(), 1);
        services.shutdown().await;

        let no_auth = RELOADING_CONFIG.replace("kubernetes", "no_auth");
        let config = AuthzConfig::from_toml_str(&no_auth).unwrap();
        let services = start_from_config(&config).await.unwrap();
        assert!(services.reload_service().is_none());
        services.shutdown().await;
    }
}
