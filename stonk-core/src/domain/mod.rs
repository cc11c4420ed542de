//! Domain types for stonk

pub mod interval;
pub mod price_row;
pub mod ticker;

pub use interval::Interval;
pub use price_row::{Periodicity, PriceRow};
pub use ticker::TickerId;
