//! Vector index backends.
//!
//! `InMemoryIndex` is an exact brute-force cosine index; `LanceIndex` keeps
//! chunks in a LanceDB table on disk. Both implement
//! [`docuchat_core::traits::VectorIndex`].

pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use lance::LanceIndex;
pub use memory::InMemoryIndex;
