pub mod index;
pub mod retriever;

pub use index::DocumentIndex;
pub use retriever::Retriever;
