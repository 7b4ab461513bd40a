//! Virtual Try-On Core - Shared domain types.
//!
//! This crate provides the types shared by the app server and its tests:
//! - Shop domains (validated `*.myshopify.com` hosts)
//! - The billing plan catalog and plan-derived usage limits
//! - Subscription statuses, webhook event kinds and usage levels
//! - Storefront button settings
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers and enums for the try-on billing domain

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
