//! Core data types for the pipeline.

pub mod citation;
pub mod document;
pub mod outcome;
pub mod text;
