//! Projected entities and immutable event records.

pub mod entities;
pub mod records;

pub use entities::*;
pub use records::*;
