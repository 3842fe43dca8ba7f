//! HTTP request handlers
//!
//! Handlers stay thin: extract the tenant context and input, call the
//! service, return JSON.

pub mod batch;
pub mod bin;
pub mod damage;
pub mod health;
pub mod item;
pub mod placement;
pub mod receiving;
pub mod stock_count;
pub mod transfer;
