//! Business logic behind the HTTP handlers.
//!
//! # Services
//!
//! - `billing` - Plan catalog, charge creation and activation, entitlements
//! - `usage` - Credit-metered try-on tracking and usage reporting
//! - `webhooks` - Shopify webhook topic dispatch

pub mod billing;
pub mod usage;
pub mod webhooks;
