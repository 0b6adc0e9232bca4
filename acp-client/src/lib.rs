//! # ACP Backend Client
//!
//! This crate provides the HTTP client for the seller surface of the ACP
//! backend, together with the retry discipline that every remote call in
//! the runtime relies on.
//!
//! Two layers compose:
//!
//! - [`BackendClient`] is the transport: JSON over HTTP with an
//!   `x-api-key` header, remote status codes surfaced in [`AcpError`],
//!   and a small built-in retry on 429/5xx.
//! - [`retry::with_retry`] is the policy layer callers wrap around
//!   operations whose local context makes another attempt worthwhile:
//!   exponential backoff with additive jitter and a bounded attempt count.
//!
//! The [`SellerApi`] trait is the seam the job runtime programs against;
//! [`HttpSellerApi`] is its production implementation.

pub mod client;
pub mod constants;
pub mod error;
pub mod retry;
pub mod seller;

pub use client::BackendClient;
pub use error::{AcpError, AcpResult, HttpErrorInfo};
pub use retry::{is_retryable, parse_http_error, with_retry, RetryOptions};
pub use seller::{HttpSellerApi, SellerApi};
