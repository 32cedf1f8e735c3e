//! Model collaborator abstraction.
//!
//! The [`Model`] trait decouples the agent loop from any particular model
//! backend. Tests use scripted models that return predetermined responses
//! without touching the network.

use anyhow::Result;

use crate::core::conversation::Conversation;
use crate::core::types::ModelResponse;
use crate::tools::ToolSpec;

/// Everything the model sees for one consultation.
///
/// The full conversation is sent every time; no server-side memory is assumed.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub conversation: &'a Conversation,
    pub tools: &'a [ToolSpec],
    pub system_instruction: &'a str,
}

/// Abstraction over generative model backends.
pub trait Model {
    /// Ask the model for its next action. An error means the model is unavailable.
    fn submit(&self, request: &ModelRequest<'_>) -> Result<ModelResponse>;
}

impl<M: Model + ?Sized> Model for &M {
    fn submit(&self, request: &ModelRequest<'_>) -> Result<ModelResponse> {
        (**self).submit(request)
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn submit(&self, request: &ModelRequest<'_>) -> Result<ModelResponse> {
        (**self).submit(request)
    }
}
