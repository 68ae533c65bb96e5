// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::WatchSection;
use crate::fs::FileSystem;
use crate::watch::path_utils::relative_str;

/// Compiled watch set: a file is watched when one of the globs matches its
/// root-relative path and its extension is listed.
///
/// ```toml
/// [watch]
/// paths = ["src/**"]
/// extensions = ["ts", "js"]
/// ```
#[derive(Clone)]
pub struct WatchPatterns {
    globs: GlobSet,
    sources: Vec<String>,
    extensions: Vec<String>,
}

impl fmt::Debug for WatchPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchPatterns")
            .field("paths", &self.sources)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl WatchPatterns {
    pub fn new(paths: &[String], extensions: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in paths {
            let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
            builder.add(glob);
        }

        let extensions = extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            globs: builder.build().context("building watch globset")?,
            sources: paths.to_vec(),
            extensions,
        })
    }

    pub fn from_section(section: &WatchSection) -> Result<Self> {
        Self::new(&section.paths, &section.extensions)
    }

    /// Glob strings as configured.
    pub fn paths(&self) -> &[String] {
        &self.sources
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// `rel_path` uses forward slashes and is relative to the watch root,
    /// e.g. `"src/index.ts"`.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.globs.is_match(rel_path) {
            return false;
        }
        let ext = Path::new(rel_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext {
            Some(ext) => self.extensions.iter().any(|allowed| *allowed == ext),
            None => false,
        }
    }

    /// Literal directory prefixes of the globs, relative to the watch root.
    ///
    /// `"src/**"` gives `"src"`; `"**/*.ts"` gives `""`, the root itself.
    /// A prefix nested inside another one is dropped.
    pub fn base_dirs(&self) -> Vec<String> {
        let mut bases: Vec<String> = self.sources.iter().map(|pat| literal_base(pat)).collect();
        // Sorted, so every ancestor precedes its descendants.
        bases.sort();
        bases.dedup();

        let mut out: Vec<String> = Vec::new();
        for base in bases {
            if !out.iter().any(|parent| is_within(&base, parent)) {
                out.push(base);
            }
        }
        out
    }

    /// Whether an absolute event path is part of the watch set.
    pub fn matches_path(&self, root: &Path, path: &Path) -> Option<String> {
        relative_str(root, path).filter(|rel| self.matches(rel))
    }
}

/// Collect every file under `root` that belongs to the watch set, sorted.
///
/// `node_modules` and dot-directories are never descended into.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    patterns: &WatchPatterns,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                if !is_skipped_dir(&path) {
                    stack.push(path);
                }
            } else if fs.is_file(&path) {
                if let Some(rel) = relative_str(root, &path) {
                    if patterns.matches(&rel) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Leading path components of `pattern` that contain no glob syntax.
///
/// A pattern without any glob syntax names a single file, so its parent is
/// the base.
fn literal_base(pattern: &str) -> String {
    let components: Vec<&str> = pattern
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    let literal = components
        .iter()
        .take_while(|c| !c.contains(['*', '?', '[', '{']))
        .count();
    let take = if literal == components.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };
    components[..take].join("/")
}

fn is_within(path: &str, parent: &str) -> bool {
    parent.is_empty()
        || path == parent
        || path.strip_prefix(parent).is_some_and(|rest| rest.starts_with('/'))
}

/// `node_modules` and dot-directories are neither scanned nor watched.
pub(crate) fn is_skipped_dir(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name == "node_modules" || name.starts_with('.'),
        None => false,
    }
}
