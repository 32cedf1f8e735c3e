//! `get_file_content`: read a sandboxed text file with a character cap.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::core::truncate::{file_truncation_marker, truncate_chars};
use crate::io::sandbox::SandboxRoot;
use crate::tools::ToolError;

/// Read `path`, keeping at most `max_chars` characters.
///
/// Longer files return the kept prefix followed by a marker naming `path` and
/// the limit.
pub fn read_file(root: &SandboxRoot, path: &str, max_chars: usize) -> Result<String, ToolError> {
    let target = root.resolve(path)?;
    if !target.is_file() {
        return Err(ToolError::NotFound {
            path: path.to_string(),
        });
    }

    let content =
        read_prefix(&target, max_chars).map_err(|err| ToolError::io("Cannot read", path, err))?;
    let (kept, truncated) = truncate_chars(&content, max_chars);
    if !truncated {
        return Ok(content);
    }
    Ok(format!("{kept}{}", file_truncation_marker(path, max_chars)))
}

/// Read enough of `target` to hold `max_chars + 1` characters.
///
/// UTF-8 needs at most four bytes per character, so a file longer than the
/// byte budget always has more than `max_chars` characters. A character cut in
/// half at the budget is dropped.
fn read_prefix(target: &Path, max_chars: usize) -> io::Result<String> {
    let budget = max_chars.saturating_add(1).saturating_mul(4);
    let mut bytes = Vec::new();
    File::open(target)?
        .take(budget as u64)
        .read_to_end(&mut bytes)?;
    let hit_budget = bytes.len() == budget;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) if hit_budget && err.utf8_error().error_len().is_none() => {
            let valid = err.utf8_error().valid_up_to();
            let mut bytes = err.into_bytes();
            bytes.truncate(valid);
            String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
        }
        Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err)),
    }
}
