//! Test-only helpers: a scripted model and throwaway sandboxes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::types::ModelResponse;
use crate::io::config::{AgentConfig, ScriptConfig};
use crate::io::model::{Model, ModelRequest};
use crate::io::sandbox::SandboxRoot;
use crate::tools::{ToolContext, ToolExecutor, ToolRegistry};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(ModelResponse),
    Fail(String),
}

/// What the model was shown on one consultation.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub turns: usize,
    pub tool_names: Vec<String>,
    pub system_instruction: String,
}

/// Model that replays queued replies, then falls back to a repeated one.
///
/// With no queued reply and no fallback, `submit` fails.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: RefCell<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::with_replies(responses.into_iter().map(ScriptedReply::Respond).collect())
    }

    pub fn with_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            ..Self::default()
        }
    }

    /// Answer every consultation with `response`.
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            fallback: Some(ScriptedReply::Respond(response)),
            ..Self::default()
        }
    }

    /// Fail every consultation with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            fallback: Some(ScriptedReply::Fail(message.to_string())),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }
}

impl Model for ScriptedModel {
    fn submit(&self, request: &ModelRequest<'_>) -> Result<ModelResponse> {
        self.requests.borrow_mut().push(RecordedRequest {
            turns: request.conversation.len(),
            tool_names: request.tools.iter().map(|spec| spec.name.to_string()).collect(),
            system_instruction: request.system_instruction.to_string(),
        });

        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow!("scripted model has no reply left"))?;
        match reply {
            ScriptedReply::Respond(response) => Ok(response),
            ScriptedReply::Fail(message) => Err(anyhow!(message)),
        }
    }
}

/// Script settings that run `.sh` files with `sh`, available on every Unix CI box.
pub fn sh_script_config(timeout_secs: u64) -> ScriptConfig {
    ScriptConfig {
        interpreter: "sh".to_string(),
        extension: "sh".to_string(),
        timeout_secs,
        ..ScriptConfig::default()
    }
}

/// Temporary sandbox directory for tool and loop tests.
pub struct TestSandbox {
    temp: tempfile::TempDir,
    root: SandboxRoot,
}

impl TestSandbox {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp sandbox")?;
        let root = SandboxRoot::new(temp.path())?;
        Ok(Self { temp, root })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.temp.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.temp.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Executor over all built-in tools with `sh` scripts and a 5 second timeout.
    pub fn executor(&self) -> Result<ToolExecutor> {
        let config = AgentConfig {
            script: sh_script_config(5),
            ..AgentConfig::default()
        };
        self.executor_with(&config)
    }

    pub fn executor_with(&self, config: &AgentConfig) -> Result<ToolExecutor> {
        let context = ToolContext::new(self.root.clone(), config);
        Ok(ToolExecutor::new(ToolRegistry::builtin()?, context))
    }
}
