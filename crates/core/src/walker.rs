use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A header found under a scan root, with its `/`-separated path relative
/// to that root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HeaderPath {
    pub relative: String,
    pub absolute: PathBuf,
}

pub struct FileWalker {
    root: PathBuf,
    extensions: HashSet<String>,
    exclude: GlobSet,
}

impl FileWalker {
    pub fn new(root: PathBuf, extensions: &[String], exclude: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude {
            builder.add(Glob::new(pattern).with_context(|| format!("invalid glob {pattern}"))?);
        }
        Ok(Self {
            root,
            extensions: extensions.iter().cloned().collect(),
            exclude: builder.build()?,
        })
    }

    /// Headers under the root, sorted by relative path.
    pub fn walk(&self) -> Result<Vec<HeaderPath>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !self.extensions.contains(ext) {
                continue;
            }

            let relative = relative_path(&self.root, path);
            if self.exclude.is_match(&relative) {
                debug!("Excluded header: {}", relative);
                continue;
            }

            debug!("Found header: {}", relative);
            files.push(HeaderPath {
                relative,
                absolute: path.to_path_buf(),
            });
        }

        files.sort();
        info!("Found {} headers under {}", files.len(), self.root.display());
        Ok(files)
    }
}

/// `root/a/b.h` gives `a/b.h`; a file given directly as the root keeps its
/// file name.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path.file_name().map(Path::new).unwrap_or(path),
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
