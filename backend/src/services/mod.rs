//! Business logic services for the Warehouse Operations Platform

pub mod batch;
pub mod bin;
pub mod damage;
pub mod item;
pub mod placement;
pub mod receiving;
pub mod stock_count;
pub mod transfer;
