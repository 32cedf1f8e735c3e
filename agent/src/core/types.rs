//! Shared deterministic types for the agent loop.
//!
//! These types define the contract between the loop, the tool layer and the
//! model collaborator. They carry no I/O and compare structurally in tests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Tool,
}

/// Structured request from the model to run a named tool.
///
/// Produced by the model and therefore untrusted: the name may not exist and
/// the arguments may have any shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build a call from a JSON object literal. Non-object values yield empty args.
    pub fn from_json(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(name, args)
    }
}

/// One immutable entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    User {
        text: String,
    },
    Agent {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        name: String,
        result: String,
    },
}

impl Turn {
    pub fn role(&self) -> Role {
        match self {
            Turn::User { .. } => Role::User,
            Turn::Agent { .. } => Role::Agent,
            Turn::Tool { .. } => Role::Tool,
        }
    }
}

/// Token accounting reported by the model for one consultation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.response_tokens += other.response_tokens;
    }
}

/// Typed model reply: optional text plus the ordered tool calls it requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub final_text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl ModelResponse {
    /// A reply that ends the loop with `text` as the answer.
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            final_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A reply that requests the given tool calls.
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn into_turn(self) -> Turn {
        Turn::Agent {
            text: self.final_text,
            tool_calls: self.tool_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turn_roles_match_variants() {
        let user = Turn::User {
            text: "hi".to_string(),
        };
        let agent = ModelResponse::answer("done").into_turn();
        let tool = Turn::Tool {
            name: "get_files_info".to_string(),
            result: String::new(),
        };
        assert_eq!(user.role(), Role::User);
        assert_eq!(agent.role(), Role::Agent);
        assert_eq!(tool.role(), Role::Tool);
    }

    #[test]
    fn tool_call_from_non_object_has_empty_args() {
        let call = ToolCall::from_json("read", json!(["a"]));
        assert!(call.args.is_empty());
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.add(Usage {
            prompt_tokens: 3,
            response_tokens: 1,
        });
        total.add(Usage {
            prompt_tokens: 4,
            response_tokens: 2,
        });
        assert_eq!(
            total,
            Usage {
                prompt_tokens: 7,
                response_tokens: 3
            }
        );
    }
}
