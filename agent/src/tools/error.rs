//! Typed failures produced by tool handlers.

use thiserror::Error;

/// Everything that can go wrong while running a tool.
///
/// Each variant renders as a plain sentence; the executor prefixes it with
/// `Error: ` before it reaches the conversation so the model can react.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Cannot access \"{path}\" as it is outside the permitted working directory")]
    BoundaryViolation { path: String },

    #[error("File not found or is not a regular file: \"{path}\"")]
    NotFound { path: String },

    #[error("\"{path}\" is not a directory")]
    NotADirectory { path: String },

    #[error("\"{path}\" is not a .{expected} file")]
    UnsupportedFileType { path: String, expected: String },

    #[error("executing \"{path}\" timed out after {secs} seconds")]
    Timeout { path: String, secs: u64 },

    #[error("Unknown function: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{action} \"{path}\": {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub(crate) fn io(action: &'static str, path: &str, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_string(),
            source,
        }
    }
}

/// Outcome of a single tool invocation before it is rendered as text.
pub type ToolResult = Result<String, ToolError>;

/// Render a tool outcome as the text appended to the conversation.
pub fn render_result(result: &ToolResult) -> String {
    match result {
        Ok(text) => text.clone(),
        Err(err) => format!("Error: {err}"),
    }
}
