pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStore, StoreConfig};
pub use record::DocumentRecord;
pub use traits::DocumentStore;
