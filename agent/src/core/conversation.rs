//! Append-only conversation history.

use serde::Serialize;

use crate::core::types::Turn;

/// Ordered history of turns shared between the loop and the model.
///
/// Turns can only be appended; nothing is edited or removed once pushed. The
/// agent loop is the only mutator, so `push` is crate-private.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation holding a single user turn.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::User {
                text: prompt.into(),
            }],
        }
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
