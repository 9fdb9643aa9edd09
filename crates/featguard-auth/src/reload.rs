//! Permission hot-reload.
//!
//! Permission changes made in the registry take effect without restarting the
//! server: a [`PermissionReloadService`] listens for change notifications and
//! calls [`SecurityManager::refresh`], which swaps the permission snapshot
//! atomically.
//!
//! # Architecture
//!
//! - [`PermissionChange`] - Events representing registry changes
//! - [`PermissionChangeNotifier`] - Broadcast channel for change notifications
//! - [`PermissionReloadService`] - Debounced, retried reloads plus optional
//!   periodic refresh
//!
//! # Example
//!
//! ```ignore
//! let notifier = Arc::new(PermissionChangeNotifier::new(64));
//! let service = Arc::new(PermissionReloadService::new(
//!     manager.clone(),
//!     notifier.clone(),
//!     ReloadConfig::default(),
//! ));
//!
//! let handle = tokio::spawn({
//!     let service = service.clone();
//!     async move { service.run().await }
//! });
//!
//! notifier.notify(PermissionChange::Updated { name: "readers".to_string() });
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Notify, broadcast};
use tokio::time::{Duration, Instant};

use crate::AuthzResult;
use crate::manager::SecurityManager;

// =============================================================================
// Permission Change Types
// =============================================================================

/// Registry changes that trigger a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionChange {
    /// A permission was applied to the project.
    Applied {
        /// Name of the applied permission.
        name: String,
    },
    /// An existing permission was updated.
    Updated {
        /// Name of the updated permission.
        name: String,
    },
    /// A permission was removed.
    Deleted {
        /// Name of the removed permission.
        name: String,
    },
    /// Request to reload all permissions.
    BulkReload,
}

impl PermissionChange {
    /// The permission name if this is a single-permission change.
    #[must_use]
    pub fn permission_name(&self) -> Option<&str> {
        match self {
            Self::Applied { name } | Self::Updated { name } | Self::Deleted { name } => Some(name),
            Self::BulkReload => None,
        }
    }

    #[must_use]
    pub fn is_bulk_reload(&self) -> bool {
        matches!(self, Self::BulkReload)
    }
}

// =============================================================================
// Permission Change Notifier
// =============================================================================

/// Broadcast channel for permission change notifications.
pub struct PermissionChangeNotifier {
    sender: broadcast::Sender<PermissionChange>,
}

impl PermissionChangeNotifier {
    /// Create a notifier holding at most `capacity` pending notifications.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Notify all subscribers. Dropped silently when nobody listens.
    pub fn notify(&self, change: PermissionChange) {
        let _ = self.sender.send(change);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PermissionChange> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PermissionChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

// =============================================================================
// Reload Configuration
// =============================================================================

/// Configuration for the permission reload service.
#[derive(Debug, Clone)]
pub struct ReloadConfig {
    /// Rapid changes within this window are batched into one reload.
    pub debounce_duration: Duration,

    /// Periodic refresh interval; `None` disables it.
    pub refresh_interval: Option<Duration>,

    /// Maximum number of reload attempts per trigger.
    pub max_attempts: u32,

    /// First retry delay, doubled on each retry.
    pub initial_backoff: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(100),
            refresh_interval: Some(Duration::from_secs(300)),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl ReloadConfig {
    /// Default configuration without periodic refresh.
    #[must_use]
    pub fn without_periodic_refresh() -> Self {
        Self {
            refresh_interval: None,
            ..Default::default()
        }
    }

    /// Fast timeouts for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            debounce_duration: Duration::from_millis(10),
            refresh_interval: None,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
        }
    }
}

/// Upper bound for the delay between reload attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

fn next_backoff(backoff: Duration) -> Duration {
    backoff.saturating_mul(2).min(MAX_BACKOFF)
}

// =============================================================================
// Reload Statistics
// =============================================================================

/// Counters exposed by the reload service.
#[derive(Debug, Clone, Default)]
pub struct ReloadStats {
    pub reload_attempts: u64,
    pub successful_reloads: u64,
    pub failed_reloads: u64,
    pub notifications_received: u64,
    /// Notifications folded into an already pending reload.
    pub notifications_debounced: u64,
}

// =============================================================================
// Permission Reload Service
// =============================================================================

/// Reloads a [`SecurityManager`]'s permissions when the registry changes.
pub struct PermissionReloadService {
    manager: Arc<SecurityManager>,
    notifier: Arc<PermissionChangeNotifier>,
    config: ReloadConfig,

    shutdown: AtomicBool,
    shutdown_signal: Notify,

    reload_attempts: AtomicU64,
    successful_reloads: AtomicU64,
    failed_reloads: AtomicU64,
    notifications_received: AtomicU64,
    notifications_debounced: AtomicU64,
}

impl PermissionReloadService {
    #[must_use]
    pub fn new(
        manager: Arc<SecurityManager>,
        notifier: Arc<PermissionChangeNotifier>,
        config: ReloadConfig,
    ) -> Self {
        Self {
            manager,
            notifier,
            config,
            shutdown: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
            reload_attempts: AtomicU64::new(0),
            successful_reloads: AtomicU64::new(0),
            failed_reloads: AtomicU64::new(0),
            notifications_received: AtomicU64::new(0),
            notifications_debounced: AtomicU64::new(0),
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called or the notifier is dropped.
    pub async fn run(&self) {
        let mut receiver = self.notifier.subscribe();
        let debounce = self.config.debounce_duration;
        let periodic = self.config.refresh_interval;

        let mut pending_reload = false;
        let mut last_notification = Instant::now();
        let mut last_refresh = Instant::now();

        tracing::info!(
            project = %self.manager.project(),
            debounce_ms = debounce.as_millis() as u64,
            periodic_refresh = periodic.is_some(),
            "Permission reload service started"
        );

        loop {
            if self.is_shutting_down() {
                break;
            }

            let periodic_remaining = periodic
                .map(|d| d.saturating_sub(last_refresh.elapsed()))
                .unwrap_or(Duration::MAX);
            let timeout = if pending_reload {
                debounce
                    .saturating_sub(last_notification.elapsed())
                    .min(periodic_remaining)
            } else {
                periodic_remaining
            };

            tokio::select! {
                () = self.shutdown_signal.notified() => {
                    break;
                }

                result = receiver.recv() => {
                    match result {
                        Ok(change) => {
                            tracing::debug!(change = ?change, "Permission change received");
                            self.notifications_received.fetch_add(1, Ordering::Relaxed);
                            if pending_reload {
                                self.notifications_debounced.fetch_add(1, Ordering::Relaxed);
                            }
                            pending_reload = true;
                            last_notification = Instant::now();
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(missed = n, "Missed permission change notifications");
                            self.notifications_debounced.fetch_add(n, Ordering::Relaxed);
                            pending_reload = true;
                            last_notification = Instant::now();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Permission change channel closed");
                            break;
                        }
                    }
                }

                () = tokio::time::sleep(timeout) => {
                    if pending_reload && last_notification.elapsed() >= debounce {
                        pending_reload = false;
                        self.perform_reload().await;
                        last_refresh = Instant::now();
                    } else if periodic.is_some_and(|d| last_refresh.elapsed() >= d) {
                        tracing::debug!("Periodic permission refresh");
                        self.perform_reload().await;
                        last_refresh = Instant::now();
                    }
                }
            }
        }

        tracing::info!("Permission reload service shutting down");
    }

    async fn perform_reload(&self) {
        if let Err(e) = self.reload_with_retry().await {
            tracing::error!(error = %e, "Permission reload failed after all retries");
        }
    }

    /// Reload with exponential backoff. Returns the number of active permissions.
    ///
    /// # Errors
    ///
    /// Returns the last refresh error once every attempt has failed; the
    /// previous permissions stay active.
    pub async fn reload_with_retry(&self) -> AuthzResult<usize> {
        let mut attempts = 0;
        let mut backoff = self.config.initial_backoff;

        loop {
            self.reload_attempts.fetch_add(1, Ordering::Relaxed);

            match self.manager.refresh().await {
                Ok(count) => {
                    self.successful_reloads.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(permissions = count, "Permissions reloaded successfully");
                    return Ok(count);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.config.max_attempts {
                        self.failed_reloads.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }

                    tracing::warn!(
                        attempt = attempts,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Permission reload failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                }
            }
        }
    }

    /// Request an immediate (debounced) reload.
    pub fn trigger_reload(&self) {
        self.notifier.notify(PermissionChange::BulkReload);
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.shutdown_signal.notify_one();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stats(&self) -> ReloadStats {
        ReloadStats {
            reload_attempts: self.reload_attempts.load(Ordering::Relaxed),
            successful_reloads: self.successful_reloads.load(Ordering::Relaxed),
            failed_reloads: self.failed_reloads.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            notifications_debounced: self.notifications_debounced.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<SecurityManager> {
        &self.manager
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<PermissionChangeNotifier> {
        &self.notifier
    }
}
