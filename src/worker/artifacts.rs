//! Artifact registry and the file-block protocol.
//!
//! Workers embed files in their output as
//! `<file path="src/main.rs">...</file>`. Every block is extracted,
//! trimmed, and upserted by path: the latest write for a path wins.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Language tag used when a path has no recognizable extension.
pub const DEFAULT_LANGUAGE: &str = "text";

static FILE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<file\s+path\s*=\s*["']([^"']+)["']\s*>(.*?)</file>"#)
        .expect("file block pattern is valid")
});

/// A file produced by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub path: String,
    pub content: String,
    pub language: String,
    /// Name of the worker that last wrote this path.
    pub created_by: String,
    pub last_modified: DateTime<Utc>,
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<String>, created_by: &str) -> Self {
        let path = path.into();
        Self {
            id: Uuid::new_v4(),
            language: language_for_path(&path).to_string(),
            path,
            content: content.into(),
            created_by: created_by.to_string(),
            last_modified: Utc::now(),
        }
    }
}

/// A file block parsed from raw worker output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlock {
    pub path: String,
    pub content: String,
}

/// Extract every file block, in order of appearance.
pub fn parse_file_blocks(raw: &str) -> Vec<FileBlock> {
    FILE_BLOCK
        .captures_iter(raw)
        .filter_map(|caps| {
            let path = caps.get(1)?.as_str().trim();
            if path.is_empty() {
                return None;
            }
            Some(FileBlock {
                path: path.to_string(),
                content: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            })
        })
        .collect()
}

/// Remove all file blocks, leaving the surrounding prose.
pub fn strip_file_blocks(raw: &str) -> String {
    FILE_BLOCK.replace_all(raw, "").trim().to_string()
}

/// Derive a language tag from the path's extension.
pub fn language_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return DEFAULT_LANGUAGE;
    };

    match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "rb" => "ruby",
        "sh" | "bash" => "shell",
        "html" | "htm" => "html",
        "css" => "css",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "sql" => "sql",
        "txt" => "text",
        _ => DEFAULT_LANGUAGE,
    }
}

/// Path-keyed, last-write-wins artifact collection.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    artifacts: Vec<Artifact>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted artifacts, collapsing duplicate paths.
    pub fn from_artifacts(artifacts: Vec<Artifact>) -> Self {
        let mut registry = Self::new();
        for artifact in artifacts {
            registry.insert(artifact);
        }
        registry
    }

    /// Write a file on behalf of a worker. Returns the stored artifact.
    pub fn upsert(&mut self, path: &str, content: &str, worker_name: &str) -> &Artifact {
        self.insert(Artifact::new(path, content, worker_name))
    }

    fn insert(&mut self, artifact: Artifact) -> &Artifact {
        match self.artifacts.iter().position(|a| a.path == artifact.path) {
            Some(idx) => {
                self.artifacts[idx] = artifact;
                &self.artifacts[idx]
            }
            None => {
                self.artifacts.push(artifact);
                &self.artifacts[self.artifacts.len() - 1]
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.path == path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.artifacts.iter().map(|a| a.path.clone()).collect()
    }

    pub fn all(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn clear(&mut self) {
        self.artifacts.clear();
    }
}
