// src/exec/redact.rs

//! Secret scrubbing for streamed output lines.
//!
//! The elevation helper occasionally echoes its stdin back (a confused
//! prompt, a diagnostic); lines forwarded to callers must never contain the
//! secret, so every streamed line passes through this chokepoint.

/// Replacement marker for scrubbed content.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Replace every occurrence of `secret` in `line` with the marker.
pub fn scrub(line: &str, secret: &str) -> String {
    if secret.is_empty() || !line.contains(secret) {
        return line.to_string();
    }
    line.replace(secret, REDACTION_MARKER)
}
