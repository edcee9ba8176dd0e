//! Utility helpers — path resolution, timestamps, string manipulation.

use std::path::PathBuf;

/// Get the Skillbot data directory (e.g. `~/.skillbot/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".skillbot")
}

/// Checkpoint directory under a data directory.
pub fn checkpoints_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("checkpoints")
}

/// Temporary script artifact directory (process-local, under the OS temp dir).
pub fn default_artifact_dir() -> PathBuf {
    std::env::temp_dir().join("skillbot")
}

/// Format a timestamp the way conversation listings show it.
pub fn display_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Conversation title from a first message: the first `max_chars`
/// characters, with "..." appended when cut.
pub fn title_from_query(query: &str, max_chars: usize) -> String {
    let query = query.trim();
    if query.chars().count() > max_chars {
        let head: String = query.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        query.to_string()
    }
}

/// Encode a string as a filename.
///
/// ASCII letters, digits and `-` are kept; every other byte becomes `_XX`
/// (lowercase hex). Distinct inputs always map to distinct names.
pub fn safe_filename(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest),
        None => PathBuf::from(path),
    }
}

fn home_dir() -> Option<PathBuf> {
    dirs_next::home_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("hello world, this is a long string", 15);
        assert_eq!(result, "hello world,...");
        assert_eq!(truncate_string("short", 10), "short");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_string("こんにちは世界です", 5), "こん...");
    }

    #[test]
    fn test_title_from_query() {
        assert_eq!(title_from_query("  short question ", 60), "short question");
        let long = "a".repeat(70);
        let title = title_from_query(&long, 60);
        assert_eq!(title.chars().count(), 63);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("3f2b-41c8-thread"), "3f2b-41c8-thread");
        assert_eq!(safe_filename("a/b"), "a_2fb");
        assert_eq!(safe_filename("a_b"), "a_5fb");
        assert_eq!(safe_filename("../x"), "_2e_2e_2fx");
        assert_eq!(safe_filename("é"), "_c3_a9");
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/skills");
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("skills"));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_display_timestamp() {
        let ts = chrono::DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(display_timestamp(&ts), "2025-03-04 05:06");
    }

    #[test]
    fn test_data_path_ends_with_skillbot() {
        assert!(get_data_path().ends_with(".skillbot"));
    }
}
