//! Plain-text extraction from structured message bodies.
//!
//! Only text segments with non-blank content contribute. Each payload is
//! trimmed, the survivors are joined with a single space, and the result
//! is trimmed again. Images, files and unparseable entries are dropped.

use crate::model::Segment;

/// Extract searchable text from a sequence of segments.
#[must_use]
pub fn extract(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter_map(|segment| match segment {
            Segment::Text { text } => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            Segment::Image { .. } | Segment::File { .. } | Segment::Other => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
