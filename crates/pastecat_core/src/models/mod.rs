//! Paste metadata and content handles.

/// Immutable per-paste metadata.
pub mod header;
/// Read handles over backend-owned paste content.
pub mod paste;

pub use header::Header;
pub use paste::Paste;
