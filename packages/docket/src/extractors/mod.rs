//! Text extraction.
//!
//! - `PlainTextExtractor` - UTF-8 text with form-feed page breaks
//! - `StoredTextProvider` - Serves verified source text from storage

pub mod plain;
pub mod stored;

pub use plain::PlainTextExtractor;
pub use stored::StoredTextProvider;
