//! Core types for Virtual Try-On.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod button;
pub mod id;
pub mod plan;
pub mod shop;
pub mod status;

pub use button::{ButtonPosition, ButtonSettings, ButtonSettingsUpdate, GarmentCategory};
pub use id::*;
pub use plan::{DEFAULT_USAGE_LIMIT, Plan, PlanInterval};
pub use shop::{ShopDomain, ShopDomainError};
pub use status::*;
