//! Checkpoint storage implementations.
//!
//! Available backends:
//! - `MemoryUnitCache` - In-memory (always available)
//! - `FileUnitCache` - One JSON file per unit under a directory

pub mod file;
pub mod memory;

pub use file::FileUnitCache;
pub use memory::MemoryUnitCache;
