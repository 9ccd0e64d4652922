//! Core types for registry synchronization

mod value;
mod record;
mod entry;
mod summary;

pub use value::*;
pub use record::*;
pub use entry::*;
pub use summary::*;
