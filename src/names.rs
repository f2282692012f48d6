//! Name derivation for provisioned cluster objects
//!
//! Kubernetes object names must match the RFC 1123 label grammar
//! (`^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$`, at most 63 characters). Image
//! references are free-form, so we sanitize the trailing path segment and
//! append a time-based suffix for collision resistance.
//!
//! Uniqueness is bounded by one-second clock resolution: two requests for
//! the same image in the same second derive the same identity and are
//! treated as a re-provision of the same workload. That window is an
//! accepted property of the naming scheme; downstream name-length budgeting
//! assumes this suffix format.

use std::time::{SystemTime, UNIX_EPOCH};

/// Fallback base when sanitizing leaves nothing usable
const FALLBACK_BASE: &str = "app";

/// Maximum length of the shared label so every decorated name
/// (`-pod`/`-svc`/`-ssh`, 4 characters each) stays within the 63-char cap.
const MAX_LABEL_LEN: usize = 59;

/// The deterministic set of names computed for one provisioning request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedIdentity {
    /// Pod (workload unit) name
    pub pod: String,
    /// Service object name
    pub service: String,
    /// Secret object name holding the caller's SSH public key
    pub secret: String,
    /// Selector label value shared by the pod and the service
    pub label: String,
}

impl DerivedIdentity {
    /// Derive the identity for an image reference using the current clock.
    pub fn derive(image: &str, prefix: &str) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::derive_at(image, prefix, now)
    }

    /// Derive the identity at a fixed Unix timestamp (seconds).
    ///
    /// Split out from [`derive`](Self::derive) so tests can pin the clock.
    pub fn derive_at(image: &str, prefix: &str, unix_secs: u64) -> Self {
        let segment = image.rsplit('/').next().unwrap_or(image);
        let base = sanitize_segment(segment);
        // The prefix is operator-supplied config; run it through the same
        // sanitizer so a bad value cannot produce an illegal name.
        let prefix = sanitize_segment(prefix);

        let mut label = format!("{}-{}-{:x}", prefix, base, unix_secs);
        label.truncate(MAX_LABEL_LEN);
        let label = label.trim_end_matches('-').to_string();

        Self {
            pod: format!("{label}-pod"),
            service: format!("{label}-svc"),
            secret: format!("{label}-ssh"),
            label,
        }
    }
}

/// Sanitize one path segment into RFC 1123 label characters.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9-]` into a
/// single `-`, and strips leading/trailing dashes. An empty result (e.g. an
/// all-punctuation segment) falls back to a fixed token.
fn sanitize_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}
