//! Metadata store implementations.
//!
//! Available backends:
//! - `MemoryMetadataStore` - In-memory storage (always available)
//! - `SqliteMetadataStore` - SQLite file-based storage (requires `sqlite` feature)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryMetadataStore;

#[cfg(feature = "sqlite")]
pub use sqlite::{MigrationReport, SqliteMetadataStore};
