//! Page renderer implementations.

pub mod lopdf;

pub use self::lopdf::LopdfRenderer;
