/// Main error type for the seller runtime.
use acp_client::AcpError;

#[derive(Debug, thiserror::Error)]
pub enum SellerError {
    // === Offering Errors ===
    #[error("Offering not configured locally: {name}")]
    OfferingNotConfigured { name: String },

    #[error("Invalid offering config at {path}: {reason}")]
    OfferingConfig { path: String, reason: String },

    #[error("Handler execution failed for {offering}: {reason}")]
    HandlerFailed { offering: String, reason: String },

    // === Delivery Errors ===
    #[error("Delivery artifact error: {0}")]
    DeliveryIo(#[from] std::io::Error),

    // === Configuration Errors ===
    #[error("Invalid configuration: {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("Seller already running (pid {pid})")]
    AlreadyRunning { pid: String },

    // === Transport Errors ===
    #[error(transparent)]
    Client(#[from] AcpError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === General System Errors ===
    #[error("Internal error: {component}: {reason}")]
    Internal { component: String, reason: String },
}

/// Convenience type alias
pub type SellerResult<T> = std::result::Result<T, SellerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_to_string_contains_context() {
        let err = SellerError::OfferingNotConfigured {
            name: "research_agent".into(),
        };
        assert_eq!(
            err.to_string(),
            "Offering not configured locally: research_agent"
        );
    }
}
