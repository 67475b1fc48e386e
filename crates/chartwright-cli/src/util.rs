//! Shared utility functions for CLI commands

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Shorten a `sha256:<hex>` digest for display
///
/// Keeps the algorithm prefix and at most `max_len` hex characters.
#[must_use]
pub fn short_digest(digest: &str, max_len: usize) -> &str {
    let prefix = digest.find(':').map(|i| i + 1).unwrap_or(0);
    let end = digest.len().min(prefix + max_len);
    &digest[..end]
}
