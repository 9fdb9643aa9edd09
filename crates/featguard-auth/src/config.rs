//! Authorization configuration.
//!
//! Configuration types for the security manager: the authentication type,
//! the permissions applied to the project, decision strategies and the
//! reload service.
//!
//! # Example (TOML)
//!
//! ```toml
//! project = "driver_ranking"
//! decision_strategy = "unanimous"
//!
//! [auth]
//! type = "oidc"
//!
//! [reload]
//! debounce = "500ms"
//! refresh_interval = "5m"
//!
//! [type_strategies]
//! entity = "affirmative"
//!
//! [[permissions]]
//! name = "readers"
//! types = ["feature_view"]
//! with_subclasses = true
//! name_pattern = "driver_.*"
//! required_tags = { team = "ranking" }
//! actions = ["read", "query"]
//!
//! [[permissions.policies]]
//! type = "role_based"
//! roles = ["reader"]
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use featguard_core::ResourceType;
use serde::{Deserialize, Serialize};

use crate::action::AuthzedAction;
use crate::decision::DecisionStrategy;
use crate::permission::Permission;
use crate::policy::{AllowAll, GroupBasedPolicy, NamespaceBasedPolicy, Policy, RoleBasedPolicy};
use crate::reload::ReloadConfig;
use crate::{AuthzError, AuthzResult};

/// Root authorization configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Project whose permissions are enforced.
    pub project: String,

    /// Authentication settings.
    pub auth: AuthSettings,

    /// Strategy combining the permissions that match one resource.
    /// When unset, the process-wide default applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_strategy: Option<DecisionStrategy>,

    /// Strategy overrides keyed by resource type (`feature_view`, `entity`, ...).
    pub type_strategies: HashMap<String, DecisionStrategy>,

    /// Permission reload settings.
    pub reload: ReloadSettings,

    /// Permissions applied to the project.
    pub permissions: Vec<PermissionConfig>,
}

/// Authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthSettings {
    /// `no_auth`, `kubernetes` or `oidc`. Unknown values disable authorization.
    #[serde(rename = "type")]
    pub auth_type: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            auth_type: "no_auth".to_string(),
        }
    }
}

/// Permission reload settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadSettings {
    /// Spawn the reload service from [`start_from_config`](crate::server::start_from_config).
    pub enabled: bool,

    /// Quiet period before a burst of change notifications triggers a reload.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,

    /// Periodic full refresh; disabled when unset.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<Duration>,

    /// Reload attempts per trigger before giving up.
    pub max_attempts: u32,

    /// First retry delay, doubled on every attempt.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_millis(100),
            refresh_interval: Some(Duration::from_secs(300)),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl ReloadSettings {
    /// Settings for the reload service.
    #[must_use]
    pub fn to_reload_config(&self) -> ReloadConfig {
        ReloadConfig {
            debounce_duration: self.debounce,
            refresh_interval: self.refresh_interval,
            max_attempts: self.max_attempts,
            initial_backoff: self.initial_backoff,
        }
    }
}

/// One configured permission.
///
/// Unset lists take the permission defaults (every type, the `all` action,
/// a single allow-all policy); explicitly empty lists are rejected.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<ResourceType>>,

    #[serde(default)]
    pub with_subclasses: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_tags: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<AuthzedAction>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<PolicyConfig>>,

    #[serde(default)]
    pub decision_strategy: DecisionStrategy,
}

impl PermissionConfig {
    /// Build and validate the permission.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` under the same conditions as
    /// [`PermissionBuilder::build`](crate::PermissionBuilder::build).
    pub fn to_permission(&self) -> AuthzResult<Permission> {
        let mut builder = Permission::builder(self.name.clone())
            .with_subclasses(self.with_subclasses)
            .decision_strategy(self.decision_strategy);

        if let Some(ref types) = self.types {
            builder = builder.types(types.iter().copied());
        }
        if let Some(ref pattern) = self.name_pattern {
            builder = builder.name_pattern(pattern.clone());
        }
        if let Some(ref tags) = self.required_tags {
            builder = builder.required_tags(tags.clone());
        }
        if let Some(ref actions) = self.actions {
            builder = builder.actions(actions.iter().copied());
        }
        if let Some(ref policies) = self.policies {
            builder = builder.policies(policies.iter().map(PolicyConfig::to_policy));
        }

        builder.build()
    }
}

/// Configured policy, selected by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    AllowAll,
    RoleBased { roles: Vec<String> },
    GroupBased { groups: Vec<String> },
    NamespaceBased { namespaces: Vec<String> },
}

impl PolicyConfig {
    #[must_use]
    pub fn to_policy(&self) -> Arc<dyn Policy> {
        match self {
            Self::AllowAll => Arc::new(AllowAll),
            Self::RoleBased { roles } => Arc::new(RoleBasedPolicy::new(roles.iter().cloned())),
            Self::GroupBased { groups } => Arc::new(GroupBasedPolicy::new(groups.iter().cloned())),
            Self::NamespaceBased { namespaces } => {
                Arc::new(NamespaceBasedPolicy::new(namespaces.iter().cloned()))
            }
        }
    }
}

impl AuthzConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the document is malformed or fails
    /// validation.
    pub fn from_toml_str(content: &str) -> AuthzResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> AuthzResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthzError::invalid_configuration(format!(
                "Failed to read authorization config {}: {e}",
                path.display()
            ))
        })?;
        tracing::debug!(path = %path.display(), "Loaded authorization config");
        Self::from_toml_str(&content)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if:
    /// - A type strategy names an unknown resource type
    /// - Any permission fails to build
    pub fn validate(&self) -> AuthzResult<()> {
        self.type_strategies()?;
        self.build_permissions()?;
        Ok(())
    }

    /// Build every configured permission, in order.
    ///
    /// # Errors
    ///
    /// Returns the first permission's `InvalidConfiguration` error.
    pub fn build_permissions(&self) -> AuthzResult<Vec<Permission>> {
        self.permissions
            .iter()
            .map(PermissionConfig::to_permission)
            .collect()
    }

    /// Parsed per-type strategy overrides.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an unknown resource type.
    pub fn type_strategies(&self) -> AuthzResult<Vec<(ResourceType, DecisionStrategy)>> {
        self.type_strategies
            .iter()
            .map(|(name, strategy)| Ok((name.parse::<ResourceType>()?, *strategy)))
            .collect()
    }
}
