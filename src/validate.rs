//! Request validation for the outer command surface.
//!
//! The search engine and queue assume validated input; this module is
//! where the command layer rejects it. Enumerated values go through
//! three-tier resolution: exact match → synonym lookup → error with
//! suggestion.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::embeddings::EmbeddingMode;
use crate::error::{Error, Result};
use crate::model::JobPriority;

/// Shortest accepted search query, in characters after trimming.
pub const MIN_QUERY_CHARS: usize = 2;

/// Largest accepted result limit.
pub const MAX_LIMIT: usize = 100;

// ── Valid value sets ─────────────────────────────────────────

pub static VALID_PRIORITIES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["high", "normal", "low"].into_iter().collect());

pub static VALID_MODES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["realtime", "queue", "cron", "manual"].into_iter().collect());

// ── Synonym maps ─────────────────────────────────────────────

pub static PRIORITY_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("urgent", "high"),
        ("critical", "high"),
        ("now", "high"),
        ("p0", "high"),
        ("p1", "high"),
        ("default", "normal"),
        ("medium", "normal"),
        ("p2", "normal"),
        ("background", "low"),
        ("later", "low"),
        ("p3", "low"),
    ]
    .into_iter()
    .collect()
});

pub static MODE_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("inline", "realtime"),
        ("sync", "realtime"),
        ("background", "queue"),
        ("async", "queue"),
        ("sweep", "cron"),
        ("scheduled", "cron"),
        ("off", "manual"),
        ("none", "manual"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a job priority via exact match or synonym lookup.
///
/// # Errors
///
/// Returns `InvalidArgument` with the closest suggestion, if any.
pub fn normalize_priority(input: &str) -> Result<JobPriority> {
    let canonical = resolve(input, &VALID_PRIORITIES, &PRIORITY_SYNONYMS, "priority")?;
    canonical.parse().map_err(Error::InvalidArgument)
}

/// Normalize an embedding mode via exact match or synonym lookup.
///
/// # Errors
///
/// Returns `InvalidArgument` with the closest suggestion, if any.
pub fn normalize_mode(input: &str) -> Result<EmbeddingMode> {
    let canonical = resolve(input, &VALID_MODES, &MODE_SYNONYMS, "mode")?;
    canonical.parse().map_err(Error::InvalidArgument)
}

fn resolve(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
    what: &str,
) -> Result<String> {
    let lower = input.trim().to_lowercase();

    if valid.contains(lower.as_str()) {
        return Ok(lower);
    }

    if let Some(&canonical) = synonyms.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    let message = match find_closest_match(&lower, valid, synonyms) {
        Some(suggestion) => format!("unknown {what} '{input}' (did you mean '{suggestion}'?)"),
        None => format!("unknown {what} '{input}'"),
    };
    Err(Error::InvalidArgument(message))
}

/// Validate a search query and return it trimmed.
///
/// # Errors
///
/// Returns `InvalidArgument` if fewer than [`MIN_QUERY_CHARS`] characters
/// remain after trimming.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_CHARS {
        return Err(Error::InvalidArgument(format!(
            "query must be at least {MIN_QUERY_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

/// Validate a similarity threshold.
///
/// # Errors
///
/// Returns `InvalidArgument` unless `0.0 <= threshold <= 1.0`.
pub fn validate_threshold(threshold: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(Error::InvalidArgument(format!(
            "threshold must be between 0 and 1, got {threshold}"
        )))
    }
}

/// Validate a result limit.
///
/// # Errors
///
/// Returns `InvalidArgument` unless `1 <= limit <= MAX_LIMIT`.
pub fn validate_limit(limit: usize) -> Result<usize> {
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(Error::InvalidArgument(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )))
    }
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 2 && best.is_none_or(|(_, d)| dist < d) {
            // For synonyms, show what it maps to
            best = Some((synonyms.get(v).copied().unwrap_or(v), dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
