//! Sandbox root and path confinement.
//!
//! Every tool resolves its target through [`SandboxRoot::resolve`]. A path is
//! accepted only if both its lexical form and its canonical form (symlinks
//! chased up to the deepest existing ancestor) stay under the root, compared
//! component by component so `/a/bc` never passes as a child of `/a/b`.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::tools::ToolError;

/// Canonical directory all tool operations are confined to.
///
/// Built once from configuration; never derived from model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    path: PathBuf,
}

impl SandboxRoot {
    /// Canonicalize `path` and require it to be an existing directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let canonical = path
            .canonicalize()
            .with_context(|| format!("resolve sandbox root {}", path.display()))?;
        if !canonical.is_dir() {
            bail!("sandbox root {} is not a directory", canonical.display());
        }
        Ok(Self { path: canonical })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `relative` against the root, rejecting anything that escapes it.
    ///
    /// `relative` is used verbatim in error messages so the model sees the
    /// argument it supplied.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let lexical = normalize_lexical(&self.path.join(relative));
        if !lexical.starts_with(&self.path) {
            warn!(path = relative, "rejected path outside sandbox");
            return Err(ToolError::BoundaryViolation {
                path: relative.to_string(),
            });
        }

        let canonical = match canonicalize_existing_prefix(&lexical) {
            Ok(Resolved::Path(canonical)) => canonical,
            Ok(Resolved::DanglingLink(link)) => {
                warn!(path = relative, link = %link.display(), "rejected dangling symlink");
                return Err(ToolError::BoundaryViolation {
                    path: relative.to_string(),
                });
            }
            Err(err) => return Err(ToolError::io("Cannot resolve", relative, err)),
        };
        if !canonical.starts_with(&self.path) {
            warn!(path = relative, resolved = %canonical.display(), "rejected symlink escape");
            return Err(ToolError::BoundaryViolation {
                path: relative.to_string(),
            });
        }

        debug!(path = relative, resolved = %canonical.display(), "resolved sandbox path");
        Ok(canonical)
    }
}

impl fmt::Display for SandboxRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.display().fmt(f)
    }
}

/// Resolve `.` and `..` without touching the filesystem.
///
/// `..` at the filesystem root is dropped, matching how the OS treats it.
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

enum Resolved {
    Path(PathBuf),
    /// The deepest existing entry is a symlink whose target cannot be resolved.
    DanglingLink(PathBuf),
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the rest.
///
/// Existence is checked with `symlink_metadata`, so a dangling symlink counts
/// as present and is reported instead of being treated as a missing name.
fn canonicalize_existing_prefix(path: &Path) -> std::io::Result<Resolved> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    while fs::symlink_metadata(&existing).is_err() {
        match existing.file_name() {
            Some(name) => tail.push(name.to_os_string()),
            None => break,
        }
        if !existing.pop() {
            break;
        }
    }

    let mut resolved = match existing.canonicalize() {
        Ok(resolved) => resolved,
        Err(err) => {
            let is_link = fs::symlink_metadata(&existing)
                .map(|meta| meta.file_type().is_symlink())
                .unwrap_or(false);
            if is_link {
                return Ok(Resolved::DanglingLink(existing));
            }
            return Err(err);
        }
    };
    for name in tail.iter().rev() {
        resolved.push(name);
    }
    Ok(Resolved::Path(resolved))
}
