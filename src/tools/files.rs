//! Workspace-confined file listing and reading.

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::extract::{extension_of, extract_text, is_converted, SAFE_TEXT_EXTENSIONS};
use super::glob::Glob;
use super::ToolError;

/// Default cap on the text returned by `read_file` (2 MiB).
pub const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024;

const NO_FILES_FOUND: &str = "No files found.";
const EMPTY_CONTENT: &str = "(file has no readable content)";

/// The directory every file tool is confined to.
///
/// The root is canonicalized once when the workspace is opened; all later
/// resolutions are checked against that canonical path.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create the directory if needed and pin its canonical path.
    pub fn open(path: &Path) -> Result<Self, ToolError> {
        let prepare = |e: std::io::Error| ToolError::Workspace {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(path).map_err(prepare)?;
        let root = path.canonicalize().map_err(prepare)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List regular, non-hidden files matching `pattern`, one relative path per line.
    pub fn list_files(&self, pattern: &str) -> String {
        match self.matching_files(pattern) {
            Ok(files) if files.is_empty() => NO_FILES_FOUND.to_string(),
            Ok(files) => files.join("\n"),
            Err(e @ ToolError::WorkspaceMissing) => e.to_string(),
            Err(e) => format!("Error listing files: {}", e),
        }
    }

    /// Read a file below the root as plain text, capped at `max_bytes`.
    ///
    /// Text files come back verbatim; converted documents that yield no text
    /// are reported as having no readable content.
    pub fn read_file(&self, filename: &str, max_bytes: usize) -> String {
        match self.read_text(filename) {
            Ok(text)
                if text.trim().is_empty()
                    && is_converted(&extension_of(Path::new(filename))) =>
            {
                EMPTY_CONTENT.to_string()
            }
            Ok(text) => truncate_to(text, max_bytes),
            Err(e) => e.to_string(),
        }
    }

    fn matching_files(&self, pattern: &str) -> Result<Vec<String>, ToolError> {
        if !self.root.is_dir() {
            return Err(ToolError::WorkspaceMissing);
        }
        let glob = Glob::new(pattern)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name().to_string_lossy().starts_with('.')
            {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if glob.is_match(&relative) {
                files.push(relative);
            }
        }

        files.sort();
        Ok(files)
    }

    fn read_text(&self, filename: &str) -> Result<String, ToolError> {
        let path = self.resolve(filename)?;

        if !path.exists() {
            return Err(ToolError::NotFound(filename.to_string()));
        }
        if !path.is_file() {
            return Err(ToolError::NotAFile(filename.to_string()));
        }

        match extract_text(&path) {
            Ok(text) => Ok(text),
            Err(e) if SAFE_TEXT_EXTENSIONS.contains(&extension_of(&path).as_str()) => {
                tracing::debug!(file = %filename, error = %e, "Extraction failed, decoding lossily");
                let bytes = std::fs::read(&path).map_err(|io| ToolError::ReadFailed {
                    name: filename.to_string(),
                    message: io.to_string(),
                })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => Err(ToolError::ReadFailed {
                name: filename.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Resolve `filename` below the root.
    ///
    /// `..` segments are applied lexically and may not climb above the root;
    /// absolute paths are rejected. Existing targets are canonicalized so a
    /// symlink cannot point outside the root either.
    fn resolve(&self, filename: &str) -> Result<PathBuf, ToolError> {
        let mut resolved = self.root.clone();
        for component in Path::new(filename).components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    if resolved == self.root {
                        return Err(ToolError::PathEscape);
                    }
                    resolved.pop();
                }
                Component::RootDir | Component::Prefix(_) => return Err(ToolError::PathEscape),
            }
        }

        if !resolved.exists() {
            return Ok(resolved);
        }

        let canonical = resolved
            .canonicalize()
            .map_err(|e| ToolError::ReadFailed {
                name: filename.to_string(),
                message: e.to_string(),
            })?;
        if !canonical.starts_with(&self.root) {
            return Err(ToolError::PathEscape);
        }
        Ok(canonical)
    }
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
fn truncate_to(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text
}
