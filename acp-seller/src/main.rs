use acp_seller::config::SellerConfig;
use acp_seller::offering::OfferingRegistry;
use acp_seller::runtime::Supervisor;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Panics unwind through the supervisor, so the PID guard still cleans
    // up; the hook makes sure the panic reaches the structured log first.
    std::panic::set_hook(Box::new(|info| {
        error!(component = "supervisor", panic = %info, "panic");
    }));

    let config = match SellerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(component = "supervisor", error = %err, "configuration invalid");
            std::process::exit(1);
        }
    };

    // Deployments link their offerings in here; the stock binary starts
    // with an empty registry and serves nothing until one is registered.
    let registry = Arc::new(OfferingRegistry::new(config.offerings_root.clone()));

    if let Err(err) = Supervisor::new(config, registry).run().await {
        error!(component = "supervisor", error = %err, "seller exited with error");
        std::process::exit(1);
    }
}
