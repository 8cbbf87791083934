pub mod baseline;
pub mod defs;
pub mod empty;
pub mod memory;

pub use baseline::{default_sources, ensure_default_sources};
pub use defs::*;
