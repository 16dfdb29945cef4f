pub mod indexer;
pub mod memory;
pub mod qdrant;
pub mod transfer;
mod wire;

pub use indexer::{chunk_point_id, ensure_collection, index_chunks, IndexReport};
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use transfer::{export_collection, inspect_payloads, restore_collection, PayloadSample};
