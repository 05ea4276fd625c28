//! azcostctl library
//!
//! Cost governance for Azure subscriptions: owner discovery and tagging of
//! resource groups, TTL-based cleanup, VM utilization metrics and right-sizing
//! recommendations. Every operation is a short sequence of calls against the
//! Azure Resource Manager REST API made through [`client::ArmClient`].

pub mod auth;
pub mod azure;
pub mod client;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod governance;
pub mod mailer;
pub mod recommendations;
pub mod store;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use client::ArmClient;
pub use config::Config;
pub use error::{AzcostError, Result};
