//! Permission registry seam.
//!
//! The registry owning the configured permissions lives outside this crate;
//! the security manager only needs to list them per project.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::AuthzResult;
use crate::permission::Permission;

/// Source of the permissions configured for a project.
#[async_trait]
pub trait PermissionRegistry: Send + Sync {
    /// List the permissions applied to `project`.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::Registry` if the registry cannot be read.
    async fn list_permissions(&self, project: &str) -> AuthzResult<Vec<Permission>>;
}

/// Registry kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    permissions: RwLock<HashMap<String, Vec<Permission>>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `permissions` for `project`.
    #[must_use]
    pub fn with_permissions(project: impl Into<String>, permissions: Vec<Permission>) -> Self {
        let registry = Self::new();
        registry.set_permissions(project, permissions);
        registry
    }

    /// Replace the permissions of `project`.
    pub fn set_permissions(&self, project: impl Into<String>, permissions: Vec<Permission>) {
        self.permissions.write().insert(project.into(), permissions);
    }

    /// Add one permission to `project`.
    pub fn apply_permission(&self, project: impl Into<String>, permission: Permission) {
        self.permissions
            .write()
            .entry(project.into())
            .or_default()
            .push(permission);
    }
}

#[async_trait]
impl PermissionRegistry for InMemoryRegistry {
    async fn list_permissions(&self, project: &str) -> AuthzResult<Vec<Permission>> {
        Ok(self
            .permissions
            .read()
            .get(project)
            .cloned()
            .unwrap_or_default())
    }
}
