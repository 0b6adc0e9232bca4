//! # ACP Seller Runtime
//!
//! A seller-side runtime for the Agent Commerce Protocol: it discovers
//! jobs addressed to the seller wallet over a push socket and a polling
//! fallback, drives each job through its phase lifecycle (accept/reject →
//! request payment → execute → deliver), and writes per-job deliverable
//! artifacts to disk.
//!
//! Deployments implement [`offering::OfferingHandlers`] for each service
//! they sell, register the implementations in an
//! [`offering::OfferingRegistry`], and hand the registry to the
//! [`runtime::Supervisor`]:
//!
//! ```no_run
//! use acp_seller::config::SellerConfig;
//! use acp_seller::offering::OfferingRegistry;
//! use acp_seller::runtime::Supervisor;
//! use std::sync::Arc;
//!
//! # async fn example() -> acp_seller::errors::SellerResult<()> {
//! let config = SellerConfig::from_env()?;
//! let registry = OfferingRegistry::new(config.offerings_root.clone());
//! // registry.register("my_offering", Arc::new(MyHandlers));
//! Supervisor::new(config, Arc::new(registry)).run().await
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod errors;
pub mod offering;
pub mod runtime;

pub use config::SellerConfig;
pub use errors::{SellerError, SellerResult};
pub use offering::{JobContext, OfferingHandlers, OfferingRegistry, Validation};
