//! Deployment marker handling and template key derivation.
//!
//! Only names that start with the marker token (for example `[CDA]`) are
//! visible to the pipeline. Templates and instances are paired by the name
//! that remains once the marker is removed.

use std::fmt;

/// Marker token used when no other is configured.
pub const DEFAULT_MARKER: &str = "[CDA]";

/// Bracketed prefix token identifying pipeline-managed items.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentMarker(String);

impl DeploymentMarker {
    /// Builds a marker from a token, wrapping a bare token such as `CDA` in
    /// brackets. Returns `None` for a blank token.
    #[must_use]
    pub fn new(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed)
            .trim();
        if inner.is_empty() {
            return None;
        }
        Some(Self(format!("[{inner}]")))
    }

    /// Returns the bracketed token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns `true` when `name` carries the marker (exact, case-sensitive
    /// prefix match).
    #[must_use]
    pub fn is_marked(&self, name: &str) -> bool {
        name.starts_with(self.as_str())
    }
}

impl Default for DeploymentMarker {
    fn default() -> Self {
        Self(DEFAULT_MARKER.to_owned())
    }
}

impl fmt::Display for DeploymentMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives the key used to pair a template with an instance.
///
/// Precondition: none; any string is accepted.
/// Postcondition: returns `Some(key)` only when `name` begins with the
/// marker and something other than whitespace follows it. The key is the
/// remainder with surrounding whitespace removed; nothing else is altered.
///
/// ```
/// use blueprint_sync::marker::{DeploymentMarker, template_key};
///
/// let marker = DeploymentMarker::default();
/// assert_eq!(template_key(&marker, "[CDA]  Hallway Light "), Some("Hallway Light"));
/// assert_eq!(template_key(&marker, "Hallway Light"), None);
/// ```
#[must_use]
pub fn template_key<'a>(marker: &DeploymentMarker, name: &'a str) -> Option<&'a str> {
    let key = name.strip_prefix(marker.as_str())?.trim();
    if key.is_empty() { None } else { Some(key) }
}
