pub mod analyzer;
pub mod discovery;
pub mod fetcher;
pub mod metadata;
pub mod storage;
pub mod text;
