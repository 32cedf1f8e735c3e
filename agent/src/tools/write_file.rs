//! `write_file`: create or overwrite a sandboxed text file.

use std::fs;

use tracing::debug;

use crate::io::sandbox::SandboxRoot;
use crate::tools::ToolError;

/// Write `content` to `path`, creating parent directories as needed.
///
/// Returns the number of characters written.
pub fn write_file(root: &SandboxRoot, path: &str, content: &str) -> Result<usize, ToolError> {
    let target = root.resolve(path)?;
    if target.is_dir() {
        return Err(ToolError::io(
            "Cannot write to",
            path,
            std::io::Error::other("target is a directory"),
        ));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| ToolError::io("Cannot create parent directory for", path, err))?;
    }
    fs::write(&target, content).map_err(|err| ToolError::io("Cannot write to", path, err))?;

    let written = content.chars().count();
    debug!(path, written, "wrote file");
    Ok(written)
}

pub fn render_written(path: &str, written: usize) -> String {
    format!("Successfully wrote to \"{path}\" ({written} characters written)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::read_file::read_file;

    fn root() -> (tempfile::TempDir, SandboxRoot) {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = SandboxRoot::new(temp.path()).expect("root");
        (temp, root)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_temp, root) = root();
        let content = "wait, this isn't lorem ipsum";
        assert_eq!(write_file(&root, "lorem.txt", content).expect("write"), 28);
        assert_eq!(read_file(&root, "lorem.txt", 1000).expect("read"), content);
    }

    #[test]
    fn creates_missing_parents() {
        let (temp, root) = root();
        write_file(&root, "pkg/morelorem.txt", "lorem ipsum").expect("write");
        assert!(temp.path().join("pkg/morelorem.txt").is_file());
        write_file(&root, "pkg/other.txt", "again").expect("second write in same dir");
    }

    #[test]
    fn overwrites_fully() {
        let (temp, root) = root();
        write_file(&root, "a.txt", "a much longer first version").expect("write");
        write_file(&root, "a.txt", "short").expect("overwrite");
        assert_eq!(
            fs::read_to_string(temp.path().join("a.txt")).expect("read"),
            "short"
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let (_temp, root) = root();
        assert_eq!(write_file(&root, "u.txt", "héllo").expect("write"), 5);
    }

    #[test]
    fn rejects_escape_before_creating_anything() {
        let (temp, root) = root();
        let err = write_file(&root, "../escape/x.txt", "nope").unwrap_err();
        assert!(matches!(err, ToolError::BoundaryViolation { .. }));
        let parent = temp.path().parent().expect("parent");
        assert!(!parent.join("escape").exists());
    }

    #[cfg(unix)]
    #[test]
    fn refuses_to_write_through_dangling_link_to_outside() {
        let (temp, root) = root();
        let outside_dir = tempfile::tempdir().expect("outside dir");
        let outside = outside_dir.path().join("outside.txt");
        std::os::unix::fs::symlink(&outside, temp.path().join("link.txt")).expect("symlink");

        let err = write_file(&root, "link.txt", "pwned").unwrap_err();
        assert!(matches!(err, ToolError::BoundaryViolation { .. }));
        assert!(!outside.exists());
    }

    #[test]
    fn directory_target_is_io_failure() {
        let (temp, root) = root();
        fs::create_dir(temp.path().join("pkg")).expect("mkdir");
        assert!(matches!(
            write_file(&root, "pkg", "x"),
            Err(ToolError::Io { .. })
        ));
    }

    #[test]
    fn render_reports_count() {
        assert_eq!(
            render_written("a.txt", 3),
            "Successfully wrote to \"a.txt\" (3 characters written)"
        );
    }
}
