//! `get_files_info`: list the direct children of a sandboxed directory.

use std::fs;

use crate::io::sandbox::SandboxRoot;
use crate::tools::ToolError;

/// One direct child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// List `directory` (default: the root), sorted by name.
pub fn list_directory(
    root: &SandboxRoot,
    directory: Option<&str>,
) -> Result<Vec<DirEntryInfo>, ToolError> {
    let shown = directory.unwrap_or(".");
    let target = root.resolve(shown)?;
    if !target.is_dir() {
        return Err(ToolError::NotADirectory {
            path: shown.to_string(),
        });
    }

    let reader = fs::read_dir(&target).map_err(|err| ToolError::io("Cannot list", shown, err))?;
    let mut entries = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|err| ToolError::io("Cannot list", shown, err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Dangling symlinks fall back to the link's own metadata.
        let meta = fs::metadata(entry.path())
            .or_else(|_| entry.metadata())
            .map_err(|err| ToolError::io("Cannot stat", &name, err))?;
        entries.push(DirEntryInfo {
            name,
            size: meta.len(),
            is_dir: meta.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub fn render_listing(entries: &[DirEntryInfo]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                "- {}: file_size={} bytes, is_dir={}",
                entry.name, entry.size, entry.is_dir
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
