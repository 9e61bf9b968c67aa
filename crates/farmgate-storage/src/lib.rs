pub mod gc;
pub mod memory;
pub mod traits;

pub use gc::run_gc_cycle;
pub use memory::InMemoryStore;
pub use traits::{RelationshipStore, SchemaStore, StorageError};
