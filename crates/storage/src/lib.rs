//! Persistence for scenarios and processes.
//!
//! Backends implement the generic [`Gateway`] trait per entity kind;
//! [`MemoryGateway`] is the reference implementation.

mod error;
mod memory;
mod traits;

pub use error::StorageError;
pub use memory::MemoryGateway;
pub use traits::{Entity, Gateway};
