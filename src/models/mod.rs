pub mod document;
pub mod professional;

pub use document::*;
pub use professional::*;
