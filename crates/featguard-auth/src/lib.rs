//! # featguard-auth
//!
//! Authorization engine for Featguard feature-store servers.
//!
//! This crate provides:
//! - Permissions selecting resources by kind, name pattern and tags
//! - Role, group and namespace based policies
//! - Unanimous and affirmative decision strategies
//! - A security manager filtering and asserting access per request
//! - Configuration, bootstrap and permission hot-reload
//!
//! ## Modules
//!
//! - [`action`] - Secured actions
//! - [`principal`] - The authenticated caller
//! - [`policy`] - Policy evaluators
//! - [`decision`] - Decision strategies and vote aggregation
//! - [`permission`] - Permission definition and matching
//! - [`manager`] - The security manager
//! - [`context`] - Request-scoped current user
//! - [`registry`] - Permission registry seam
//! - [`token`] - Access-token extraction and parsing seams
//! - [`config`] - Authorization configuration
//! - [`server`] - Security manager bootstrap
//! - [`reload`] - Permission hot-reload

pub mod action;
pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod manager;
pub mod permission;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod reload;
pub mod server;
pub mod token;

pub use action::AuthzedAction;
pub use config::{AuthSettings, AuthzConfig, PermissionConfig, PolicyConfig, ReloadSettings};
pub use context::{current_user, with_current_user, with_current_user_sync};
pub use decision::{
    DecisionEvaluator, DecisionStrategy, global_decision_strategy, set_global_decision_strategy,
};
pub use error::{AuthzError, ErrorCategory};
pub use manager::{SecurityManager, no_security_manager};
pub use permission::{Permission, PermissionBuilder, PermissionGrant};
pub use policy::{
    AllowAll, GroupBasedPolicy, NamespaceBasedPolicy, Policy, PolicyDecision, RoleBasedPolicy,
};
pub use principal::User;
pub use registry::{InMemoryRegistry, PermissionRegistry};
pub use reload::{
    PermissionChange, PermissionChangeNotifier, PermissionReloadService, ReloadConfig, ReloadStats,
};
pub use server::{
    AuthType, AuthzServices, init_from_config, init_security_manager, start_from_config,
};
pub use token::{
    AuthManager, BearerTokenExtractor, Metadata, StaticTokenParser, TokenExtractor, TokenParser,
};

/// Type alias for authorization results.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Prelude module for convenient imports.
///
/// ```
/// use featguard_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthzResult;
    pub use crate::action::AuthzedAction;
    pub use crate::context::{current_user, with_current_user};
    pub use crate::decision::DecisionStrategy;
    pub use crate::error::{AuthzError, ErrorCategory};
    pub use crate::manager::{SecurityManager, no_security_manager};
    pub use crate::permission::Permission;
    pub use crate::policy::{
        AllowAll, GroupBasedPolicy, NamespaceBasedPolicy, Policy, RoleBasedPolicy,
    };
    pub use crate::principal::User;
    pub use crate::registry::PermissionRegistry;
}
