//! Sandboxed tools the model can call.
//!
//! Each [`Tool`] variant owns one capability and its [`ToolSpec`]. Tools never
//! see a caller-supplied root: the [`ToolContext`] carrying the sandbox and
//! limits is injected by the [`ToolExecutor`].

mod args;
pub mod error;
pub mod list_dir;
pub mod read_file;
pub mod registry;
pub mod run_script;
pub mod schema;
pub mod write_file;

use serde_json::{Map, Value};

use self::args::{optional_str, optional_str_list, required_str};
use crate::io::config::{AgentConfig, ScriptConfig};
use crate::io::sandbox::SandboxRoot;

pub use error::{ToolError, ToolResult, render_result};
pub use registry::{ToolExecutor, ToolRegistry};
pub use schema::{ParamSpec, ParamType, ToolSpec};

/// Fixed, trusted parameters injected into every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub root: SandboxRoot,
    pub max_file_chars: usize,
    pub script: ScriptConfig,
}

impl ToolContext {
    pub fn new(root: SandboxRoot, config: &AgentConfig) -> Self {
        Self {
            root,
            max_file_chars: config.max_file_chars,
            script: config.script.clone(),
        }
    }
}

/// The closed set of tools exposed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    ListDirectory,
    ReadFile,
    WriteFile,
    RunScript,
}

impl Tool {
    pub const ALL: [Tool; 4] = [
        Tool::ListDirectory,
        Tool::ReadFile,
        Tool::WriteFile,
        Tool::RunScript,
    ];

    /// Name the model uses to call this tool.
    pub fn name(self) -> &'static str {
        match self {
            Tool::ListDirectory => "get_files_info",
            Tool::ReadFile => "get_file_content",
            Tool::WriteFile => "write_file",
            Tool::RunScript => "run_python_file",
        }
    }

    pub fn spec(self) -> ToolSpec {
        match self {
            Tool::ListDirectory => ToolSpec {
                name: self.name(),
                description: "Lists files in the specified directory along with their sizes, \
                              constrained to the working directory.",
                params: vec![ParamSpec {
                    name: "directory",
                    description: "The directory to list files from, relative to the working \
                                  directory. If not provided, lists files in the working \
                                  directory itself.",
                    ty: ParamType::String,
                    required: false,
                }],
            },
            Tool::ReadFile => ToolSpec {
                name: self.name(),
                description: "Reads a file's contents (truncated to a safe limit) within the \
                              working directory.",
                params: vec![ParamSpec {
                    name: "file_path",
                    description: "Path to the file, relative to the working directory.",
                    ty: ParamType::String,
                    required: true,
                }],
            },
            Tool::WriteFile => ToolSpec {
                name: self.name(),
                description: "Writes (creates or overwrites) a file in the working directory.",
                params: vec![
                    ParamSpec {
                        name: "file_path",
                        description: "Path to write, relative to the working directory.",
                        ty: ParamType::String,
                        required: true,
                    },
                    ParamSpec {
                        name: "content",
                        description: "Text content to write to the file.",
                        ty: ParamType::String,
                        required: true,
                    },
                ],
            },
            Tool::RunScript => ToolSpec {
                name: self.name(),
                description: "Executes a Python file in the working directory with optional \
                              arguments.",
                params: vec![
                    ParamSpec {
                        name: "file_path",
                        description: "Python file to execute, relative to the working directory.",
                        ty: ParamType::String,
                        required: true,
                    },
                    ParamSpec {
                        name: "args",
                        description: "Optional list of arguments to pass to the Python file.",
                        ty: ParamType::StringArray,
                        required: false,
                    },
                ],
            },
        }
    }

    /// Run the tool and render its success payload as text.
    pub fn invoke(self, ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
        let tool = self.name();
        match self {
            Tool::ListDirectory => {
                let directory = optional_str(tool, args, "directory")?;
                let entries = list_dir::list_directory(&ctx.root, directory)?;
                Ok(list_dir::render_listing(&entries))
            }
            Tool::ReadFile => {
                let path = required_str(tool, args, "file_path")?;
                read_file::read_file(&ctx.root, path, ctx.max_file_chars)
            }
            Tool::WriteFile => {
                let path = required_str(tool, args, "file_path")?;
                let content = required_str(tool, args, "content")?;
                let written = write_file::write_file(&ctx.root, path, content)?;
                Ok(write_file::render_written(path, written))
            }
            Tool::RunScript => {
                let path = required_str(tool, args, "file_path")?;
                let script_args = optional_str_list(tool, args, "args")?;
                let output = run_script::run_script(&ctx.root, &ctx.script, path, &script_args)?;
                Ok(output.render())
            }
        }
    }
}
