//! Inventory domain models

pub mod batch;
pub mod bin;
pub mod damage;
pub mod item;
pub mod placement;
pub mod stock_count;
pub mod transfer;

pub use batch::*;
pub use bin::*;
pub use damage::*;
pub use item::*;
pub use placement::*;
pub use stock_count::*;
pub use transfer::*;
