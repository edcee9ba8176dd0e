//! File search tools — `glob_search` and `grep_search` under a fixed root.
//!
//! Paths given by the model are interpreted relative to the search root and
//! may not escape it. Results are root-relative, sorted, and capped.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use super::base::{optional_nonempty, require_string, Tool};

/// Maximum number of result lines returned to the model.
const MAX_RESULTS: usize = 100;

/// Files larger than this are skipped by `grep_search`.
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

// ─────────────────────────────────────────────
// FileSearch
// ─────────────────────────────────────────────

/// What `grep_search` reports for each match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrepMode {
    FilesWithMatches,
    Content,
    Count,
}

impl GrepMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "files_with_matches" => Some(Self::FilesWithMatches),
            "content" => Some(Self::Content),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

/// Read-only search over a directory tree.
#[derive(Clone, Debug)]
pub struct FileSearch {
    root: PathBuf,
}

impl FileSearch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an optional model-supplied directory against the root.
    fn resolve(&self, path: Option<&str>) -> Result<PathBuf, String> {
        let Some(raw) = path else {
            return Ok(self.root.clone());
        };
        let rel = Path::new(raw.trim_start_matches('/'));
        let inside = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !inside {
            return Err(format!("Error: Path '{raw}' is outside the search root"));
        }
        let dir = self.root.join(rel);
        if !dir.is_dir() {
            return Err(format!("Error: Path '{raw}' not found"));
        }
        Ok(dir)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    /// Files under `path` matching a glob pattern such as `**/*.csv`.
    pub fn glob_search(&self, pattern: &str, path: Option<&str>) -> String {
        let base = match self.resolve(path) {
            Ok(b) => b,
            Err(e) => return e,
        };

        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&base.to_string_lossy()),
            pattern.trim_start_matches('/')
        );
        let entries = match glob::glob(&full) {
            Ok(paths) => paths,
            Err(e) => return format!("Error: Invalid glob pattern '{pattern}': {e}"),
        };

        let mut matches: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|p| p.is_file())
            .map(|p| self.relative(&p))
            .collect();
        matches.sort();
        debug!(pattern, count = matches.len(), "glob search");

        if matches.is_empty() {
            return format!("No files found matching pattern: {pattern}");
        }
        cap_results(matches)
    }

    /// Search file contents with a regular expression.
    ///
    /// `include` filters by file name (e.g. `*.py`).
    pub fn grep_search(
        &self,
        pattern: &str,
        path: Option<&str>,
        include: Option<&str>,
        mode: GrepMode,
    ) -> String {
        let base = match self.resolve(path) {
            Ok(b) => b,
            Err(e) => return e,
        };
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => return format!("Error: Invalid regex pattern '{pattern}': {e}"),
        };
        let include = match include.map(glob::Pattern::new).transpose() {
            Ok(p) => p,
            Err(e) => return format!("Error: Invalid include pattern: {e}"),
        };

        let walker = WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        let mut lines = Vec::new();
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(inc) = &include {
                if !inc.matches(&entry.file_name().to_string_lossy()) {
                    continue;
                }
            }
            if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
                continue;
            }
            // Binary or non-UTF-8 files are skipped.
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };

            let rel = self.relative(entry.path());
            let hits: Vec<(usize, &str)> = content
                .lines()
                .enumerate()
                .filter(|(_, line)| re.is_match(line))
                .map(|(i, line)| (i + 1, line))
                .collect();
            if hits.is_empty() {
                continue;
            }

            match mode {
                GrepMode::FilesWithMatches => lines.push(rel),
                GrepMode::Count => lines.push(format!("{rel}: {}", hits.len())),
                GrepMode::Content => {
                    lines.extend(hits.iter().map(|(n, text)| format!("{rel}:{n}: {text}")))
                }
            }
        }

        if lines.is_empty() {
            return format!("No matches found for pattern: {pattern}");
        }
        cap_results(lines)
    }
}

fn cap_results(mut lines: Vec<String>) -> String {
    let total = lines.len();
    if total > MAX_RESULTS {
        lines.truncate(MAX_RESULTS);
        lines.push(format!("... ({} more results not shown)", total - MAX_RESULTS));
    }
    lines.join("\n")
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

pub struct GlobSearchTool {
    search: Arc<FileSearch>,
}

impl GlobSearchTool {
    pub fn new(search: Arc<FileSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for GlobSearchTool {
    fn name(&self) -> &str {
        "glob_search"
    }

    fn description(&self) -> &str {
        "Find files by name pattern (e.g. '**/*.csv'). Returns matching paths relative to the search root."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern, e.g. '*.py' or 'data/**/*.xlsx'"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to the search root"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let pattern = require_string(&params, "pattern")?;
        let path = optional_nonempty(&params, "path");
        Ok(self.search.glob_search(&pattern, path.as_deref()))
    }
}

pub struct GrepSearchTool {
    search: Arc<FileSearch>,
}

impl GrepSearchTool {
    pub fn new(search: Arc<FileSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to the search root"
                },
                "include": {
                    "type": "string",
                    "description": "File name filter, e.g. '*.md'"
                },
                "output_mode": {
                    "type": "string",
                    "enum": ["files_with_matches", "content", "count"],
                    "description": "files_with_matches (default), content (path:line: text), or count"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let pattern = require_string(&params, "pattern")?;
        let path = optional_nonempty(&params, "path");
        let include = optional_nonempty(&params, "include");
        let mode = match optional_nonempty(&params, "output_mode") {
            None => GrepMode::FilesWithMatches,
            Some(m) => GrepMode::parse(&m)
                .ok_or_else(|| anyhow::anyhow!("Unknown output_mode '{m}'"))?,
        };
        Ok(self
            .search
            .grep_search(&pattern, path.as_deref(), include.as_deref(), mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, FileSearch) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("data/raw")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("data/sales.csv"), "id,amount\n1,10\n").unwrap();
        fs::write(root.join("data/raw/old.csv"), "id,amount\n").unwrap();
        fs::write(root.join("notes.md"), "amount is in USD\nnothing here\namount again\n").unwrap();
        fs::write(root.join(".git/config"), "amount = secret\n").unwrap();
        let search = FileSearch::new(root);
        (dir, search)
    }

    #[test]
    fn test_glob_recursive_sorted() {
        let (_dir, search) = fixture();
        let out = search.glob_search("**/*.csv", None);
        assert_eq!(out, "data/raw/old.csv\ndata/sales.csv");
    }

    #[test]
    fn test_glob_within_subdir() {
        let (_dir, search) = fixture();
        assert_eq!(search.glob_search("*.csv", Some("data")), "data/sales.csv");
    }

    #[test]
    fn test_glob_no_matches() {
        let (_dir, search) = fixture();
        assert_eq!(
            search.glob_search("*.parquet", None),
            "No files found matching pattern: *.parquet"
        );
    }

    #[test]
    fn test_path_cannot_escape_root() {
        let (_dir, search) = fixture();
        let out = search.glob_search("*", Some("../"));
        assert_eq!(out, "Error: Path '../' is outside the search root");
    }

    #[test]
    fn test_grep_files_with_matches_skips_hidden() {
        let (_dir, search) = fixture();
        let out = search.grep_search("amount", None, None, GrepMode::FilesWithMatches);
        assert_eq!(out, "data/raw/old.csv\ndata/sales.csv\nnotes.md");
    }

    #[test]
    fn test_grep_content_and_count() {
        let (_dir, search) = fixture();
        let content = search.grep_search("^amount", None, Some("*.md"), GrepMode::Content);
        assert_eq!(content, "notes.md:1: amount is in USD\nnotes.md:3: amount again");

        let count = search.grep_search("amount", None, Some("*.md"), GrepMode::Count);
        assert_eq!(count, "notes.md: 2");
    }

    #[test]
    fn test_grep_invalid_regex() {
        let (_dir, search) = fixture();
        let out = search.grep_search("(unclosed", None, None, GrepMode::Content);
        assert!(out.starts_with("Error: Invalid regex pattern '(unclosed'"));
    }

    #[test]
    fn test_results_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..105 {
            fs::write(dir.path().join(format!("f{i:03}.txt")), "x").unwrap();
        }
        let out = FileSearch::new(dir.path()).glob_search("*.txt", None);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 101);
        assert_eq!(lines[100], "... (5 more results not shown)");
    }

    #[tokio::test]
    async fn test_grep_tool_rejects_unknown_mode() {
        let (_dir, search) = fixture();
        let tool = GrepSearchTool::new(Arc::new(search));
        let mut params = HashMap::new();
        params.insert("pattern".into(), json!("amount"));
        params.insert("output_mode".into(), json!("lines"));
        assert!(tool.execute(params).await.is_err());
    }
}
