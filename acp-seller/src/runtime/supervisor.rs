//! Process lifetime: PID file, signals, and startup of the event sources.

use crate::config::SellerConfig;
use crate::errors::{SellerError, SellerResult};
use crate::offering::OfferingRegistry;
use crate::runtime::alert::Alerter;
use crate::runtime::dispatcher::Dispatcher;
use crate::runtime::ledger::StageLedger;
use crate::runtime::poll::PollReconciler;
use crate::runtime::socket::{SocketConfig, SocketListener};
use crate::runtime::stages::StageExecutor;
use acp_client::{BackendClient, HttpSellerApi, RetryOptions, SellerApi};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const PID_FILE: &str = "seller.pid";

/// Holds the PID file for the process lifetime; removal happens on drop,
/// covering signal-driven and error exits alike.
pub struct PidGuard {
    path: PathBuf,
}

impl PidGuard {
    /// Refuse to start when another seller holds the PID file.
    pub fn acquire(config_dir: &Path) -> SellerResult<Self> {
        std::fs::create_dir_all(config_dir)?;
        let path = config_dir.join(PID_FILE);
        if path.exists() {
            let pid = std::fs::read_to_string(&path)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(SellerError::AlreadyRunning { pid });
        }
        std::fs::write(&path, std::process::id().to_string())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub struct Supervisor {
    config: SellerConfig,
    registry: Arc<OfferingRegistry>,
}

impl Supervisor {
    pub fn new(config: SellerConfig, registry: Arc<OfferingRegistry>) -> Self {
        Self { config, registry }
    }

    /// Run the seller until a termination signal arrives.
    pub async fn run(self) -> SellerResult<()> {
        let _pid = PidGuard::acquire(&self.config.config_dir)?;

        let offerings = self.registry.available_offerings();
        info!(
            component = "supervisor",
            wallet = %self.config.wallet_address,
            offerings = offerings.len(),
            poll_enabled = self.config.poll_enabled,
            "seller starting"
        );

        let client = BackendClient::new(&self.config.base_url, &self.config.api_key)?;
        let api: Arc<dyn SellerApi> = Arc::new(HttpSellerApi::new(client));
        let ledger = Arc::new(StageLedger::new());
        let stages = StageExecutor::new(
            api.clone(),
            self.registry.clone(),
            ledger.clone(),
            self.config.delivery_root.clone(),
            RetryOptions::default(),
        );
        let dispatcher = Arc::new(Dispatcher::new(&self.config.wallet_address, ledger, stages));
        let alerter = Arc::new(Alerter::new(self.config.pagerduty_routing_key.clone()));

        let socket = SocketListener::new(
            SocketConfig {
                url: self.config.socket_url(),
                wallet_address: self.config.wallet_address.clone(),
                disconnect_alert_after: self.config.disconnect_alert_after,
                reconnect_alert_attempts: self.config.reconnect_alert_attempts,
            },
            dispatcher.clone(),
            alerter,
        );
        let socket_task = tokio::spawn(socket.run());

        let poll_task = if self.config.poll_enabled {
            let reconciler = PollReconciler::new(
                api,
                dispatcher,
                self.config.poll_interval,
                self.config.poll_page_size,
            );
            tokio::spawn(reconciler.run())
        } else {
            info!(component = "supervisor", "polling disabled by configuration");
            tokio::spawn(std::future::pending::<()>())
        };

        let outcome = tokio::select! {
            _ = shutdown_signal() => {
                info!(component = "supervisor", "shutdown signal received");
                Ok(())
            }
            join = socket_task => {
                error!(component = "supervisor", "socket listener exited unexpectedly");
                Err(join_error("socket", join))
            }
            join = poll_task => {
                error!(component = "supervisor", "poll reconciler exited unexpectedly");
                Err(join_error("poll", join))
            }
        };

        outcome
        // PID file removed by PidGuard::drop.
    }
}

fn join_error(component: &str, join: Result<(), tokio::task::JoinError>) -> SellerError {
    SellerError::Internal {
        component: component.to_string(),
        reason: match join {
            Ok(()) => "task returned".to_string(),
            Err(err) => err.to_string(),
        },
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            warn!(component = "supervisor", error = %err, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pid_file_is_exclusive_and_cleaned_up() {
        let tmp = TempDir::new().unwrap();
        let guard = PidGuard::acquire(tmp.path()).unwrap();
        let path = guard.path().to_path_buf();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );

        match PidGuard::acquire(tmp.path()) {
            Err(SellerError::AlreadyRunning { pid }) => {
                assert_eq!(pid, std::process::id().to_string());
            }
            _ => panic!("second acquire must refuse"),
        }

        drop(guard);
        assert!(!path.exists());
    }
}
