//! Request-scoped caller identity.
//!
//! The current user lives in a tokio task-local, so two requests served
//! concurrently never see each other's principal. Server handlers wrap the
//! request future once the token has been parsed:
//!
//! ```ignore
//! let user = auth_manager.authenticate(&request).await?;
//! with_current_user(user, async move {
//!     let views = security_manager.permitted_resources(views, &[AuthzedAction::Read]);
//!     // ...
//! })
//! .await
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::principal::User;

tokio::task_local! {
    static CURRENT_USER: Option<Arc<User>>;
}

/// Run `future` with `user` as the current principal.
pub async fn with_current_user<F>(user: Option<User>, future: F) -> F::Output
where
    F: Future,
{
    CURRENT_USER.scope(user.map(Arc::new), future).await
}

/// Run the synchronous closure `f` with `user` as the current principal.
pub fn with_current_user_sync<R>(user: Option<User>, f: impl FnOnce() -> R) -> R {
    CURRENT_USER.sync_scope(user.map(Arc::new), f)
}

/// The principal of the enclosing request scope, if any.
#[must_use]
pub fn current_user() -> Option<Arc<User>> {
    CURRENT_USER.try_with(Clone::clone).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_no_scope_means_no_user() {
        assert!(current_user().is_none());
    }

    #[test]
    fn test_sync_scope() {
        let name = with_current_user_sync(Some(User::new("alice", ["reader"])), || {
            current_user().map(|u| u.username.clone())
        });
        assert_eq!(name.as_deref(), Some("alice"));
        assert!(current_user().is_none());
    }

    #[test]
    fn test_anonymous_scope() {
        let user = with_current_user_sync(None, current_user);
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let first = tokio::spawn(with_current_user(Some(User::new("r", ["reader"])), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            current_user().map(|u| u.username.clone())
        }));
        let second = tokio::spawn(with_current_user(Some(User::new("w", ["writer"])), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            current_user().map(|u| u.username.clone())
        }));

        assert_eq!(first.await.unwrap().as_deref(), Some("r"));
        assert_eq!(second.await.unwrap().as_deref(), Some("w"));
    }

    #[tokio::test]
    async fn test_nested_scopes_restore_outer_user() {
        with_current_user(Some(User::new("outer", Vec::<String>::new())), async {
            with_current_user(Some(User::new("inner", Vec::<String>::new())), async {
                assert_eq!(current_user().unwrap().username, "inner");
            })
            .await;
            assert_eq!(current_user().unwrap().username, "outer");
        })
        .await;
    }
}
