//! HTTP request handlers.

/// Paste upload and download endpoints.
pub mod paste;
