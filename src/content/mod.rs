//! Searchable content derived from message bodies.
//!
//! - [`extract`] pulls plain text out of structured segments
//! - [`fingerprint`] hashes that text for change detection

pub mod extract;
pub mod fingerprint;

pub use extract::extract;
pub use fingerprint::{content_hash, has_changed};
