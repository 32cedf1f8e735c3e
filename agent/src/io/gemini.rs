//! Gemini `generateContent` adapter for the [`Model`] trait.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::core::conversation::Conversation;
use crate::core::types::{ModelResponse, ToolCall, Turn, Usage};
use crate::io::config::ModelConfig;
use crate::io::model::{Model, ModelRequest};
use crate::tools::{ParamType, ToolSpec};

/// Blocking HTTP client for the Gemini API.
pub struct GeminiModel {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Read the API key from the environment variable named in `config`.
    ///
    /// A `.env` file in the working directory is honoured if present.
    pub fn from_env(config: &ModelConfig) -> Result<Self> {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            warn!(err = %err, "failed to load .env file");
        }
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("read API key from ${}", config.api_key_env))?;
        Self::new(config, api_key)
    }
}

impl std::fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiModel")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Model for GeminiModel {
    #[instrument(skip_all, fields(model = %self.model, turns = request.conversation.len()))]
    fn submit(&self, request: &ModelRequest<'_>) -> Result<ModelResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = build_request_body(request);

        debug!("sending generateContent request");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .context("send generateContent request")?;

        let status = response.status();
        let text = response.text().context("read generateContent response")?;
        if !status.is_success() {
            bail!("gemini returned {status}: {text}");
        }
        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .with_context(|| format!("parse generateContent response: {text}"))?;
        parsed.into_model_response()
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    FunctionCall {
        name: String,
        args: Map<String, Value>,
    },
    FunctionResponse {
        name: String,
        response: Value,
    },
}

fn build_request_body(request: &ModelRequest<'_>) -> Value {
    let declarations: Vec<Value> = request.tools.iter().map(function_declaration).collect();
    json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "contents": build_contents(request.conversation),
        "tools": [{ "functionDeclarations": declarations }],
    })
}

/// Map turns to Gemini contents. Consecutive tool turns share one content.
fn build_contents(conversation: &Conversation) -> Vec<Content> {
    let mut contents = Vec::new();
    let mut responses = Vec::new();

    for turn in conversation {
        if let Turn::Tool { name, result } = turn {
            responses.push(Part::FunctionResponse {
                name: name.clone(),
                response: json!({ "result": result }),
            });
            continue;
        }
        flush_responses(&mut contents, &mut responses);

        match turn {
            Turn::User { text } => contents.push(Content {
                role: "user",
                parts: vec![Part::Text(text.clone())],
            }),
            Turn::Agent { text, tool_calls } => {
                let mut parts = Vec::new();
                if let Some(text) = text.as_ref().filter(|text| !text.is_empty()) {
                    parts.push(Part::Text(text.clone()));
                }
                parts.extend(tool_calls.iter().map(|call| Part::FunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                }));
                if parts.is_empty() {
                    parts.push(Part::Text(String::new()));
                }
                contents.push(Content {
                    role: "model",
                    parts,
                });
            }
            Turn::Tool { .. } => {}
        }
    }
    flush_responses(&mut contents, &mut responses);
    contents
}

fn flush_responses(contents: &mut Vec<Content>, responses: &mut Vec<Part>) {
    if responses.is_empty() {
        return;
    }
    contents.push(Content {
        role: "user",
        parts: std::mem::take(responses),
    });
}

fn function_declaration(spec: &ToolSpec) -> Value {
    let mut properties = Map::new();
    for param in &spec.params {
        let schema = match param.ty {
            ParamType::String => json!({ "type": "STRING", "description": param.description }),
            ParamType::StringArray => json!({
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": param.description,
            }),
        };
        properties.insert(param.name.to_string(), schema);
    }
    let mut parameters = json!({ "type": "OBJECT", "properties": properties });
    let required: Vec<&str> = spec
        .params
        .iter()
        .filter(|param| param.required)
        .map(|param| param.name)
        .collect();
    if !required.is_empty() {
        parameters["required"] = json!(required);
    }
    json!({
        "name": spec.name,
        "description": spec.description,
        "parameters": parameters,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GenerateContentResponse {
    fn into_model_response(self) -> Result<ModelResponse> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("gemini response has no candidates"))?;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(text) = part.text {
                texts.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall::from_json(call.name, call.args));
            }
        }

        let usage = self
            .usage_metadata
            .map(|meta| Usage {
                prompt_tokens: meta.prompt_token_count,
                response_tokens: meta.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            final_text: (!texts.is_empty()).then(|| texts.concat()),
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    fn parse(value: Value) -> Result<ModelResponse> {
        let parsed: GenerateContentResponse = serde_json::from_value(value)?;
        parsed.into_model_response()
    }

    #[test]
    fn body_merges_consecutive_tool_turns() {
        let mut convo = Conversation::new("what files are here?");
        convo.push(Turn::Agent {
            text: None,
            tool_calls: vec![
                ToolCall::from_json("get_files_info", json!({})),
                ToolCall::from_json("get_file_content", json!({ "file_path": "a.txt" })),
            ],
        });
        convo.push(Turn::Tool {
            name: "get_files_info".to_string(),
            result: "- a.txt: file_size=1 bytes, is_dir=false".to_string(),
        });
        convo.push(Turn::Tool {
            name: "get_file_content".to_string(),
            result: "x".to_string(),
        });
        let registry = ToolRegistry::builtin().expect("registry");
        let request = ModelRequest {
            conversation: &convo,
            tools: registry.specs(),
            system_instruction: "be helpful",
        };

        let body = build_request_body(&request);
        let contents = body["contents"].as_array().expect("contents");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "what files are here?");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][1]["functionCall"]["name"], "get_file_content");
        assert_eq!(contents[2]["parts"].as_array().expect("parts").len(), 2);
        assert_eq!(
            contents[2]["parts"][1]["functionResponse"]["response"]["result"],
            "x"
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
    }

    #[test]
    fn declarations_use_gemini_types() {
        let spec = crate::tools::Tool::RunScript.spec();
        let decl = function_declaration(&spec);
        assert_eq!(decl["parameters"]["type"], "OBJECT");
        assert_eq!(decl["parameters"]["properties"]["args"]["type"], "ARRAY");
        assert_eq!(decl["parameters"]["required"], json!(["file_path"]));

        let list = function_declaration(&crate::tools::Tool::ListDirectory.spec());
        assert!(list["parameters"].get("required").is_none());
    }

    #[test]
    fn parses_function_calls_in_order() {
        let response = parse(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "functionCall": { "name": "get_files_info", "args": { "directory": "pkg" } } },
                        { "functionCall": { "name": "run_python_file", "args": { "file_path": "main.py" } } }
                    ]
                }
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 5 }
        }))
        .expect("parse");

        assert_eq!(response.final_text, None);
        let names: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_files_info", "run_python_file"]);
        assert_eq!(response.tool_calls[0].args["directory"], "pkg");
        assert_eq!(
            response.usage,
            Usage {
                prompt_tokens: 12,
                response_tokens: 5
            }
        );
    }

    #[test]
    fn parses_plain_text_answer() {
        let response = parse(json!({
            "candidates": [{ "content": { "parts": [{ "text": "The answer " }, { "text": "is 8." }] } }]
        }))
        .expect("parse");
        assert_eq!(response.final_text.as_deref(), Some("The answer is 8."));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.usage, Usage::default());
    }

    #[test]
    fn missing_candidates_is_an_error() {
        assert!(parse(json!({ "candidates": [] })).is_err());
    }
}
