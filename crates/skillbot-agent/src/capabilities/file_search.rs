//! File search capability — `glob_search` and `grep_search` under one root.

use std::path::PathBuf;
use std::sync::Arc;

use super::Capability;
use crate::tools::{FileSearch, GlobSearchTool, GrepSearchTool, Tool};

pub struct FileSearchCapability {
    search: Arc<FileSearch>,
}

impl FileSearchCapability {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            search: Arc::new(FileSearch::new(root)),
        }
    }
}

impl Capability for FileSearchCapability {
    fn name(&self) -> &str {
        "file_search"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(GlobSearchTool::new(self.search.clone())),
            Arc::new(GrepSearchTool::new(self.search.clone())),
        ]
    }
}
