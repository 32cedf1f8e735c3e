//! Tool lookup and guarded execution.

use anyhow::{Context, Result};
use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::ToolCall;
use crate::tools::{Tool, ToolContext, ToolError, ToolResult, ToolSpec};

struct RegisteredTool {
    tool: Tool,
    validator: Validator,
}

/// Immutable name → tool mapping built once at startup.
///
/// Keeps each tool's argument schema compiled alongside it so calls are
/// validated before any handler runs.
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Registry holding every built-in tool.
    pub fn builtin() -> Result<Self> {
        Self::with_tools(&Tool::ALL)
    }

    pub fn with_tools(tools: &[Tool]) -> Result<Self> {
        let mut entries = Vec::with_capacity(tools.len());
        let mut specs = Vec::with_capacity(tools.len());
        for &tool in tools {
            let spec = tool.spec();
            let validator = jsonschema::options()
                .with_draft(Draft::Draft202012)
                .build(&spec.json_schema())
                .with_context(|| format!("compile argument schema for {}", spec.name))?;
            entries.push(RegisteredTool { tool, validator });
            specs.push(spec);
        }
        Ok(Self { entries, specs })
    }

    /// Specs in registration order, as presented to the model.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.find(name).map(|entry| entry.tool)
    }

    fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.entries.iter().find(|entry| entry.tool.name() == name)
    }
}

/// Runs model-requested tool calls against a fixed [`ToolContext`].
///
/// Every outcome, including unknown names and malformed arguments, comes back
/// as a [`ToolResult`] value; nothing here aborts the agent loop.
pub struct ToolExecutor {
    registry: ToolRegistry,
    context: ToolContext,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, context: ToolContext) -> Self {
        Self { registry, context }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        self.registry.specs()
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    #[instrument(skip_all, fields(tool = %call.name))]
    pub fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(entry) = self.registry.find(&call.name) else {
            warn!("model requested unknown tool");
            return Err(ToolError::UnknownTool {
                name: call.name.clone(),
            });
        };

        let instance = Value::Object(call.args.clone());
        let problems: Vec<String> = entry
            .validator
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect();
        if !problems.is_empty() {
            warn!(problems = problems.len(), "tool arguments failed schema validation");
            return Err(ToolError::InvalidArguments {
                tool: call.name.clone(),
                message: problems.join("; "),
            });
        }

        info!("executing tool");
        let result = entry.tool.invoke(&self.context, &call.args);
        match &result {
            Ok(text) => debug!(bytes = text.len(), "tool succeeded"),
            Err(err) => warn!(err = %err, "tool failed"),
        }
        result
    }
}
