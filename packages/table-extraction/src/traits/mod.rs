//! Core trait abstractions for the table extraction pipeline.
//!
//! Applications implement these to plug in a vision backend, a PDF
//! renderer, and checkpoint storage.

pub mod ai;
pub mod cache;
pub mod renderer;
