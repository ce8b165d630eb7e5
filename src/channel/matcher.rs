//! Line-oriented pattern matching over a channel's unread bytes.

use super::ByteChannel;

/// Drain every complete line queued on `channel` and report whether any of
/// them contained `needle`.
///
/// All complete lines are consumed even after a match, and consumed lines
/// are never examined again. A trailing line without its `\n` stays in the
/// buffer for a later check.
///
/// # Example
///
/// ```rust
/// use scriptstate::channel::{contains_pattern, ByteChannel};
///
/// let (tx, rx) = ByteChannel::pair();
/// tx.write(b"boot\nfoo\n").unwrap();
///
/// assert!(contains_pattern(&rx, b"boot"));
/// assert!(!contains_pattern(&rx, b"foo"));
/// ```
pub fn contains_pattern(channel: &ByteChannel, needle: &[u8]) -> bool {
    let mut found = false;
    while let Some(line) = channel.read_line() {
        if contains(&line, needle) {
            found = true;
        }
    }
    found
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
