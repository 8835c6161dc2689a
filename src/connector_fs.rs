//! Local directory source.
//!
//! Walks a root directory (recursively or only its top level), keeps files
//! whose extension is on the allow-list, drops paths matching the exclude
//! globs, and keys every file by its basename. Traversal is sorted by file
//! name so the first-wins rule picks the same file on every run.

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::{normalize_extensions, LocalSourceConfig};
use crate::error::{Operation, StoreError};
use crate::models::{extension_key, ContentRef, DocumentRecord, Enumeration};
use crate::traits::{DocumentSource, StagedContent};

/// A [`DocumentSource`] over a local directory tree.
pub struct LocalDirectorySource {
    name: String,
    config: LocalSourceConfig,
    include_ext: Vec<String>,
}

impl LocalDirectorySource {
    pub fn new(name: impl Into<String>, config: LocalSourceConfig, include_ext: &[String]) -> Self {
        Self {
            name: name.into(),
            config,
            include_ext: normalize_extensions(include_ext),
        }
    }
}

#[async_trait]
impl DocumentSource for LocalDirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &str {
        "local"
    }

    async fn enumerate(&self) -> Result<Enumeration> {
        scan_directory(&self.config, &self.include_ext)
    }

    async fn stage(&self, record: &DocumentRecord) -> Result<StagedContent, StoreError> {
        match &record.content_ref {
            ContentRef::Path(path) => Ok(StagedContent::in_place(path)),
            ContentRef::DriveItem { .. } => Err(StoreError::malformed(
                Operation::ReadContent,
                &record.name,
                "local source cannot stage a drive item",
            )),
        }
    }
}

/// Enumerate the files under `config.root`.
///
/// `include_ext` must already be normalized (see
/// [`normalize_extensions`]); an empty list admits every extension.
pub fn scan_directory(config: &LocalSourceConfig, include_ext: &[String]) -> Result<Enumeration> {
    let root = &config.root;
    if !root.exists() {
        bail!("Local source root does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("Local source root is not a directory: {}", root.display());
    }

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut enumeration = Enumeration::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    path = %e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %e,
                    "skipping unreadable entry"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !extension_allowed(&name, include_ext) {
            continue;
        }

        let size = entry.metadata().ok().map(|m| m.len());
        enumeration.push(DocumentRecord {
            name,
            content_ref: ContentRef::Path(path.to_path_buf()),
            size,
        });
    }

    Ok(enumeration)
}

/// Case-insensitive allow-list check; an empty list allows everything.
pub fn extension_allowed(name: &str, include_ext: &[String]) -> bool {
    if include_ext.is_empty() {
        return true;
    }
    match extension_key(name) {
        Some(ext) => include_ext.iter().any(|allowed| *allowed == ext),
        None => false,
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
