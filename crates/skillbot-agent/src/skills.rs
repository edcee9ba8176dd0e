//! Skill catalog — discovers, summarizes, and serves skill documents.
//!
//! # Architecture
//!
//! Skills are **Markdown bundles**: a directory holding a `SKILL.md`
//! descriptor plus any reference files it points to. They add declarative
//! knowledge, not tools. The agent sees a one-paragraph summary of every
//! skill in its system prompt and loads full documents on demand with the
//! `view_skill` tool.
//!
//! ## Discovery
//!
//! `<root>/<skill_id>/SKILL.md` for each configured root. When the same id
//! appears under several roots, the last root scanned wins.
//!
//! ## SKILL.md format
//!
//! ```text
//! ---
//! name: CSV Analysis
//! description: Explore tabular files with pandas
//! ---
//!
//! # CSV Analysis
//!
//! Start by delegating to `data_analysis` ...
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Descriptor filename inside each skill directory.
pub const SKILL_FILE: &str = "SKILL.md";

// ─────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────

/// Name and description parsed from a descriptor's header block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
}

/// One discovered skill.
#[derive(Clone, Debug)]
pub struct SkillDescriptor {
    /// Directory name, unique within the catalog.
    pub id: String,
    /// Skill directory (reference files are resolved against it).
    pub dir: PathBuf,
    /// Parsed header, or the reason it could not be read.
    pub summary: Result<SkillSummary, String>,
}

impl SkillDescriptor {
    pub fn document(&self) -> PathBuf {
        self.dir.join(SKILL_FILE)
    }

    /// Display name, falling back to the id when the header is unreadable.
    pub fn display_name(&self) -> &str {
        match &self.summary {
            Ok(s) => &s.name,
            Err(_) => &self.id,
        }
    }
}

// ─────────────────────────────────────────────
// SkillCatalog
// ─────────────────────────────────────────────

/// Read-only set of skills, built once at startup.
#[derive(Clone, Debug, Default)]
pub struct SkillCatalog {
    skills: BTreeMap<String, SkillDescriptor>,
}

impl SkillCatalog {
    /// Scan each root in order. Missing roots contribute nothing.
    pub fn discover(roots: &[PathBuf]) -> Self {
        let mut catalog = Self::default();
        for root in roots {
            catalog.scan_root(root);
        }
        info!(count = catalog.skills.len(), "skill catalog ready");
        catalog
    }

    /// Convenience for a single root.
    pub fn from_dir(root: &Path) -> Self {
        Self::discover(&[root.to_path_buf()])
    }

    fn scan_root(&mut self, root: &Path) {
        if !root.is_dir() {
            debug!(root = %root.display(), "skills root missing, skipping");
            return;
        }

        let walker = WalkDir::new(root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name();

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || entry.file_name() != SKILL_FILE {
                continue;
            }
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            let Some(id) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let summary = read_summary(entry.path());
            if let Err(e) = &summary {
                warn!(skill = id, error = %e, "skill header unreadable");
            }
            if self.skills.contains_key(id) {
                debug!(skill = id, root = %root.display(), "skill overridden by later root");
            } else {
                debug!(skill = id, "discovered skill");
            }

            self.skills.insert(
                id.to_string(),
                SkillDescriptor {
                    id: id.to_string(),
                    dir: dir.to_path_buf(),
                    summary,
                },
            );
        }
    }

    /// Skill ids, sorted.
    pub fn list_skills(&self) -> Vec<String> {
        self.skills.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&SkillDescriptor> {
        self.skills.get(id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &SkillDescriptor> {
        self.skills.values()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Markdown summary of every skill for the system prompt.
    ///
    /// Skills whose header failed to parse appear with the error instead.
    pub fn get_summaries(&self) -> String {
        if self.skills.is_empty() {
            return "No skills available.".to_string();
        }

        let mut lines = Vec::new();
        for (id, skill) in &self.skills {
            match &skill.summary {
                Ok(summary) => {
                    lines.push(format!("## {}", summary.name));
                    lines.push(format!("**ID**: `{id}`"));
                    lines.push(format!("**Description**: {}\n", summary.description));
                }
                Err(e) => {
                    lines.push(format!("## {id}"));
                    lines.push(format!("**Error loading summary**: {e}\n"));
                }
            }
        }
        lines.join("\n")
    }

    /// Read a file from a skill directory.
    ///
    /// `file` defaults to the descriptor, whose header is stripped. Every
    /// failure is returned as text because it travels back to the model.
    pub fn load(&self, id: &str, file: Option<&str>) -> String {
        let file = file.unwrap_or(SKILL_FILE);

        let Some(skill) = self.skills.get(id) else {
            return format!(
                "Error: Skill '{id}' not found. Available skills: {}",
                self.list_skills().join(", ")
            );
        };

        let Some(path) = resolve_within(&skill.dir, file) else {
            return format!("Error: File '{file}' is outside skill '{id}'");
        };
        if !path.is_file() {
            return format!("Error: File '{file}' not found in skill '{id}'");
        }

        match std::fs::read_to_string(&path) {
            Ok(content) if file == SKILL_FILE => strip_frontmatter(&content).to_string(),
            Ok(content) => content,
            Err(e) => format!("Error loading '{file}' from skill '{id}': {e}"),
        }
    }
}

// ─────────────────────────────────────────────
// Helper functions
// ─────────────────────────────────────────────

/// Header block: `---` line, key/value lines, closing `---` line.
fn frontmatter_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?\n)---[ \t]*\r?\n").ok())
        .as_ref()
}

fn header_field(block: &str, key: &str) -> Option<String> {
    block.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        let value = rest.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Parse the header block of a descriptor file.
fn read_summary(path: &Path) -> Result<SkillSummary, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    parse_summary(&content)
}

fn parse_summary(content: &str) -> Result<SkillSummary, String> {
    let caps = frontmatter_re()
        .and_then(|re| re.captures(content))
        .ok_or_else(|| format!("No frontmatter found in {SKILL_FILE}"))?;
    let block = caps.get(1).map_or("", |m| m.as_str());

    Ok(SkillSummary {
        name: header_field(block, "name").unwrap_or_else(|| "Unknown".to_string()),
        description: header_field(block, "description")
            .unwrap_or_else(|| "No description".to_string()),
    })
}

/// Drop the header block, if any.
fn strip_frontmatter(content: &str) -> &str {
    match frontmatter_re().and_then(|re| re.find(content)) {
        Some(m) => &content[m.end()..],
        None => content,
    }
}

/// Join `file` onto `dir`, refusing absolute paths and parent traversal.
fn resolve_within(dir: &Path, file: &str) -> Option<PathBuf> {
    let rel = Path::new(file);
    let clean = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    clean.then(|| dir.join(rel))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
