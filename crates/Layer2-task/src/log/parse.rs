//! Line decoding and level detection

use ralph_foundation::LogLevel;
use regex::Regex;
use std::sync::OnceLock;

const LEVEL_PATTERNS: [&str; 3] = [
    // 2024-01-15 10:30:45 [INFO] message
    r"^\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:\.\d+)?\s+\[(?P<level>\w+)]\s+",
    // 2024-01-15T10:30:45.123Z INFO message
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z?\s+(?P<level>DEBUG|INFO|WARN(?:ING)?|ERROR|CRITICAL)\s+",
    // [INFO] message
    r"^\[(?P<level>DEBUG|INFO|WARN(?:ING)?|ERROR|CRITICAL)]\s+",
];

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        LEVEL_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Severity of a log line. Lines that match no known layout are `Info`.
pub fn parse_level(text: &str) -> LogLevel {
    for pattern in patterns() {
        if let Some(caps) = pattern.captures(text) {
            return caps
                .name("level")
                .and_then(|m| LogLevel::from_label(m.as_str()))
                .unwrap_or(LogLevel::Info);
        }
    }
    LogLevel::Info
}

/// Raw bytes read up to a newline, as display text: the line terminator is
/// removed, invalid UTF-8 is replaced, and terminal escape sequences are
/// stripped.
pub fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    while end > 0 && (raw[end - 1] == b'\n' || raw[end - 1] == b'\r') {
        end -= 1;
    }
    let text = String::from_utf8_lossy(&raw[..end]);
    if text.contains('\u{1b}') {
        strip_ansi_escapes::strip_str(text)
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert_eq!(patterns().len(), LEVEL_PATTERNS.len());
    }

    #[test]
    fn test_parse_level_layouts() {
        assert_eq!(
            parse_level("2024-01-15 10:30:45 [ERROR] build failed"),
            LogLevel::Error
        );
        assert_eq!(
            parse_level("2024-01-15 10:30:45.123 [warn] slow disk"),
            LogLevel::Warning
        );
        assert_eq!(
            parse_level("2024-01-15T10:30:45.123Z CRITICAL out of memory"),
            LogLevel::Critical
        );
        assert_eq!(parse_level("[DEBUG] tick"), LogLevel::Debug);
        assert_eq!(parse_level("[WARNING] retrying"), LogLevel::Warning);
    }

    #[test]
    fn test_parse_level_fallback() {
        assert_eq!(parse_level("plain output"), LogLevel::Info);
        assert_eq!(parse_level("[debug] lowercase needs a timestamp"), LogLevel::Info);
        assert_eq!(
            parse_level("2024-01-15 10:30:45 [VERBOSE] unknown label"),
            LogLevel::Info
        );
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"\x1b[32mgreen\x1b[0m\n"), "green");
        assert_eq!(decode_line(b"bad \xff byte"), "bad \u{fffd} byte");
        assert_eq!(decode_line(b""), "");
    }
}
