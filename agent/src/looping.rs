//! The agent loop: consult the model, run the tools it asks for, repeat.
//!
//! The loop is a small state machine. Each iteration consults the model once
//! and, if tool calls come back, runs them strictly in order before the next
//! consultation. It ends in [`AgentState::Done`] when the model answers without
//! tool calls, or in [`AgentState::Failed`] when the model is unavailable or the
//! iteration cap is reached.

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::core::conversation::Conversation;
use crate::core::types::{ToolCall, Turn, Usage};
use crate::io::model::{Model, ModelRequest};
use crate::io::prompt::render_system_instruction;
use crate::tools::{ToolExecutor, ToolResult, render_result};

/// Iteration cap used when the configuration does not override it.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Why a run ended without an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("no final answer after {max_iterations} iterations")]
    IterationExhausted { max_iterations: u32 },
    #[error("model unavailable: {message}")]
    ModelUnavailable { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentState {
    AwaitingModel,
    /// Tool calls from the latest model response, in the order requested.
    HandlingTool(Vec<ToolCall>),
    Done(String),
    Failed(Failure),
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Done(_) | AgentState::Failed(_))
    }
}

/// Progress notifications for callers that want to display the run.
#[derive(Debug)]
pub enum LoopEvent<'a> {
    ModelResponded {
        iteration: u32,
        usage: Usage,
        tool_calls: usize,
    },
    ToolStarted {
        iteration: u32,
        call: &'a ToolCall,
    },
    ToolExecuted {
        iteration: u32,
        call: &'a ToolCall,
        result: &'a ToolResult,
        text: &'a str,
    },
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Terminal state: `Done` or `Failed`.
    pub state: AgentState,
    pub iterations: u32,
    pub usage: Usage,
    pub conversation: Conversation,
}

impl LoopOutcome {
    pub fn answer(&self) -> Option<&str> {
        match &self.state {
            AgentState::Done(answer) => Some(answer),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.state {
            AgentState::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Single-run agent loop. The loop is the only writer of its conversation.
pub struct AgentLoop<'a, M: Model> {
    model: M,
    executor: &'a ToolExecutor,
    system_instruction: String,
    max_iterations: u32,
    conversation: Conversation,
    state: AgentState,
    iterations: u32,
    usage: Usage,
}

impl<'a, M: Model> AgentLoop<'a, M> {
    pub fn new(
        model: M,
        executor: &'a ToolExecutor,
        system_instruction: impl Into<String>,
        max_iterations: u32,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model,
            executor,
            system_instruction: system_instruction.into(),
            max_iterations,
            conversation: Conversation::new(prompt),
            state: AgentState::AwaitingModel,
            iterations: 0,
            usage: Usage::default(),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Completed model consultations so far.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Apply one transition. Terminal states are left unchanged.
    pub fn step<F: FnMut(&LoopEvent<'_>)>(&mut self, on_event: &mut F) -> &AgentState {
        let current = std::mem::replace(&mut self.state, AgentState::AwaitingModel);
        self.state = match current {
            AgentState::AwaitingModel => self.consult_model(on_event),
            AgentState::HandlingTool(calls) => {
                self.run_tools(&calls, on_event);
                AgentState::AwaitingModel
            }
            terminal => terminal,
        };
        &self.state
    }

    /// Drive the loop to a terminal state.
    #[instrument(skip_all, fields(max_iterations = self.max_iterations))]
    pub fn run<F: FnMut(&LoopEvent<'_>)>(mut self, mut on_event: F) -> LoopOutcome {
        info!("starting agent loop");
        while !self.state.is_terminal() {
            self.step(&mut on_event);
        }
        info!(
            iterations = self.iterations,
            done = matches!(self.state, AgentState::Done(_)),
            "agent loop finished"
        );
        LoopOutcome {
            state: self.state,
            iterations: self.iterations,
            usage: self.usage,
            conversation: self.conversation,
        }
    }

    fn consult_model<F: FnMut(&LoopEvent<'_>)>(&mut self, on_event: &mut F) -> AgentState {
        if self.iterations >= self.max_iterations {
            warn!(max_iterations = self.max_iterations, "iteration cap reached");
            return AgentState::Failed(Failure::IterationExhausted {
                max_iterations: self.max_iterations,
            });
        }
        self.iterations += 1;

        let request = ModelRequest {
            conversation: &self.conversation,
            tools: self.executor.specs(),
            system_instruction: &self.system_instruction,
        };
        let response = match self.model.submit(&request) {
            Ok(response) => response,
            Err(err) => {
                error!(iteration = self.iterations, err = %format!("{err:#}"), "model call failed");
                return AgentState::Failed(Failure::ModelUnavailable {
                    message: format!("{err:#}"),
                });
            }
        };

        let usage = response.usage;
        self.usage.add(usage);
        debug!(
            iteration = self.iterations,
            tool_calls = response.tool_calls.len(),
            "model responded"
        );
        on_event(&LoopEvent::ModelResponded {
            iteration: self.iterations,
            usage,
            tool_calls: response.tool_calls.len(),
        });

        let tool_calls = response.tool_calls.clone();
        let answer = response.final_text.clone().unwrap_or_default();
        self.conversation.push(response.into_turn());
        if tool_calls.is_empty() {
            AgentState::Done(answer)
        } else {
            AgentState::HandlingTool(tool_calls)
        }
    }

    fn run_tools<F: FnMut(&LoopEvent<'_>)>(&mut self, calls: &[ToolCall], on_event: &mut F) {
        for call in calls {
            on_event(&LoopEvent::ToolStarted {
                iteration: self.iterations,
                call,
            });
            let result = self.executor.execute(call);
            let text = render_result(&result);
            on_event(&LoopEvent::ToolExecuted {
                iteration: self.iterations,
                call,
                result: &result,
                text: &text,
            });
            self.conversation.push(Turn::Tool {
                name: call.name.clone(),
                result: text,
            });
        }
    }
}

/// Run `prompt` to completion with the standard system instruction.
pub fn run_agent<M: Model, F: FnMut(&LoopEvent<'_>)>(
    model: M,
    executor: &ToolExecutor,
    max_iterations: u32,
    prompt: &str,
    on_event: F,
) -> Result<LoopOutcome> {
    let system_instruction = render_system_instruction(executor.specs())?;
    Ok(AgentLoop::new(model, executor, system_instruction, max_iterations, prompt).run(on_event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ModelResponse, Role};
    use crate::test_support::{ScriptedModel, TestSandbox};
    use serde_json::json;

    fn list_call() -> ToolCall {
        ToolCall::from_json("get_files_info", json!({ "directory": "." }))
    }

    #[test]
    fn answer_without_tools_finishes_in_one_iteration() {
        let sandbox = TestSandbox::new().expect("sandbox");
        let executor = sandbox.executor().expect("executor");
        let model = ScriptedModel::new(vec![ModelResponse::answer("hello")]);

        let outcome = run_agent(&model, &executor, 20, "say hi", |_| {}).expect("run");

        assert_eq!(outcome.answer(), Some("hello"));
        assert_eq!(outcome.iterations, 1);
        assert_eq!(model.calls(), 1);
        let roles: Vec<Role> = outcome.conversation.iter().map(Turn::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Agent]);
        assert_eq!(
            outcome.conversation.turns()[1],
            Turn::Agent {
                text: Some("hello".to_string()),
                tool_calls: Vec::new(),
            }
        );
    }

    #[test]
    fn always_calling_tools_fails_after_exactly_cap_iterations() {
        let sandbox = TestSandbox::new().expect("sandbox");
        let executor = sandbox.executor().expect("executor");
        let model = ScriptedModel::repeating(ModelResponse::calls(vec![list_call()]));

        let outcome = run_agent(&model, &executor, DEFAULT_MAX_ITERATIONS, "loop", |_| {})
            .expect("run");

        assert_eq!(
            outcome.failure(),
            Some(&Failure::IterationExhausted { max_iterations: 20 })
        );
        assert_eq!(outcome.iterations, 20);
        assert_eq!(model.calls(), 20);
        // user + 20 * (agent + tool)
        assert_eq!(outcome.conversation.len(), 41);
    }

    #[test]
    fn tool_results_follow_request_order() {
        let sandbox = TestSandbox::new().expect("sandbox");
        sandbox.write("a.txt", "alpha").expect("write");
        let executor = sandbox.executor().expect("executor");
        let model = ScriptedModel::new(vec![
            ModelResponse::calls(vec![
                ToolCall::from_json("get_file_content", json!({ "file_path": "a.txt" })),
                ToolCall::from_json("nope", json!({})),
                list_call(),
            ]),
            ModelResponse::answer("done"),
        ]);

        let outcome = run_agent(&model, &executor, 20, "go", |_| {}).expect("run");

        let tool_turns: Vec<(&str, &str)> = outcome
            .conversation
            .iter()
            .filter_map(|turn| match turn {
                Turn::Tool { name, result } => Some((name.as_str(), result.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            tool_turns,
            vec![
                ("get_file_content", "alpha"),
                ("nope", "Error: Unknown function: nope"),
                ("get_files_info", "- a.txt: file_size=5 bytes, is_dir=false"),
            ]
        );
        assert_eq!(outcome.answer(), Some("done"));
        assert_eq!(outcome.iterations, 2);
    }

    #[test]
    fn model_error_fails_without_answer() {
        let sandbox = TestSandbox::new().expect("sandbox");
        let executor = sandbox.executor().expect("executor");
        let model = ScriptedModel::failing("connection refused");

        let outcome = run_agent(&model, &executor, 20, "hi", |_| {}).expect("run");

        match outcome.failure() {
            Some(Failure::ModelUnavailable { message }) => {
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected failure {other:?}"),
        }
        assert_eq!(outcome.answer(), None);
        assert_eq!(outcome.conversation.len(), 1);
    }

    #[test]
    fn step_walks_through_states() {
        let sandbox = TestSandbox::new().expect("sandbox");
        let executor = sandbox.executor().expect("executor");
        let model = ScriptedModel::new(vec![
            ModelResponse::calls(vec![list_call()]),
            ModelResponse::answer("ok"),
        ]);
        let mut agent = AgentLoop::new(&model, &executor, "sys", 5, "q");
        let mut ignore = |_: &LoopEvent<'_>| {};

        assert_eq!(agent.state(), &AgentState::AwaitingModel);
        assert!(matches!(
            agent.step(&mut ignore),
            AgentState::HandlingTool(calls) if calls.len() == 1
        ));
        assert_eq!(agent.step(&mut ignore), &AgentState::AwaitingModel);
        assert_eq!(agent.step(&mut ignore), &AgentState::Done("ok".to_string()));
        assert_eq!(agent.step(&mut ignore), &AgentState::Done("ok".to_string()));
        assert_eq!(agent.iterations(), 2);
        assert_eq!(agent.conversation().len(), 4);
    }

    #[test]
    fn model_sees_growing_conversation_each_iteration() {
        let sandbox = TestSandbox::new().expect("sandbox");
        let executor = sandbox.executor().expect("executor");
        let model = ScriptedModel::new(vec![
            ModelResponse::calls(vec![list_call(), list_call()]),
            ModelResponse::answer("ok"),
        ]);

        run_agent(&model, &executor, 20, "q", |_| {}).expect("run");

        let seen: Vec<usize> = model.requests().iter().map(|req| req.turns).collect();
        assert_eq!(seen, vec![1, 4]);
        assert!(model.requests()[0].system_instruction.contains("get_files_info"));
        assert_eq!(model.requests()[0].tool_names.len(), 4);
    }

    #[test]
    fn events_report_each_tool_call() {
        let sandbox = TestSandbox::new().expect("sandbox");
        let executor = sandbox.executor().expect("executor");
        let model = ScriptedModel::new(vec![
            ModelResponse::calls(vec![list_call()]).with_usage(Usage {
                prompt_tokens: 10,
                response_tokens: 2,
            }),
            ModelResponse::answer("ok").with_usage(Usage {
                prompt_tokens: 15,
                response_tokens: 3,
            }),
        ]);

        let mut tools_seen = Vec::new();
        let mut responses = 0;
        let outcome = run_agent(&model, &executor, 20, "q", |event| match event {
            LoopEvent::ModelResponded { .. } => responses += 1,
            LoopEvent::ToolStarted { .. } => {}
            LoopEvent::ToolExecuted { call, result, .. } => {
                tools_seen.push((call.name.clone(), result.is_ok()));
            }
        })
        .expect("run");

        assert_eq!(responses, 2);
        assert_eq!(tools_seen, vec![("get_files_info".to_string(), true)]);
        assert_eq!(
            outcome.usage,
            Usage {
                prompt_tokens: 25,
                response_tokens: 5
            }
        );
    }
}
