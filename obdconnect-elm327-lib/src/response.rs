//! Cleaning of raw adapter output

use crate::{PROMPT, SEARCHING};

/// Strip adapter chrome from one raw read.
///
/// Blank lines, `SEARCHING...` lines and trailing `>` prompts are removed and
/// the surviving lines are joined with a single space. Returns `None` when
/// nothing survives, so a present response is never empty.
///
/// The read may hold partial or merged lines; each fragment is treated as its
/// own line.
pub fn clean(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let prompt = char::from(PROMPT);

    let lines: Vec<&str> = text
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(SEARCHING))
        .map(|line| line.strip_suffix(prompt).map_or(line, str::trim))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_single_reply() {
        assert_eq!(clean(b"41 0C 1A F8\r>"), Some("41 0C 1A F8".to_string()));
        assert_eq!(clean(b"ELM327 v2.1\r>"), Some("ELM327 v2.1".to_string()));
    }

    #[test]
    fn test_clean_noise_only() {
        assert_eq!(clean(b""), None);
        assert_eq!(clean(b">"), None);
        assert_eq!(clean(b"\r\r>"), None);
        assert_eq!(clean(b"SEARCHING...\r>"), None);
        assert_eq!(clean(b"\r\nSEARCHING...\r\n\r\nSEARCHING...\r\n"), None);
        assert_eq!(clean(b"  \r  \n\t"), None);
    }

    #[test]
    fn test_clean_drops_searching_before_data() {
        assert_eq!(
            clean(b"SEARCHING...\r41 0D 22\r\r>"),
            Some("41 0D 22".to_string())
        );
    }

    #[test]
    fn test_clean_joins_lines() {
        assert_eq!(
            clean(b"41 0C 1A\r\nF8 \r\n>"),
            Some("41 0C 1A F8".to_string())
        );
    }

    #[test]
    fn test_clean_prompt_glued_to_text() {
        assert_eq!(clean(b"OK >"), Some("OK".to_string()));
        assert_eq!(clean(b"NO DATA\r\r>"), Some("NO DATA".to_string()));
    }

    #[test]
    fn test_clean_partial_frame() {
        // A read that stopped before the prompt arrived
        assert_eq!(clean(b"41 0C 1"), Some("41 0C 1".to_string()));
    }

    #[test]
    fn test_clean_idempotent() {
        let frames: [&[u8]; 3] = [b"41 05 5A\r>", b"SEARCHING...\rOK\r>", b"ELM327 v2.1"];
        for raw in frames {
            let once = clean(raw).unwrap();
            assert_eq!(clean(once.as_bytes()), Some(once.clone()));
        }
    }

    #[test]
    fn test_clean_lossy_utf8() {
        assert_eq!(clean(b"\xFFOK\r>"), Some("\u{FFFD}OK".to_string()));
    }
}
