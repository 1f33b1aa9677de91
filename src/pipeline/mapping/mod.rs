//! Structured record → template cells.

pub mod schema;
pub mod output;
pub mod mapper;

pub use mapper::*;
pub use output::*;
pub use schema::*;
