//! Bounded conversation memory.

use std::collections::VecDeque;

use crate::models::ConversationTurn;

/// Keeps completed turns for the current session.
///
/// Every turn is retained until [`clear`](Self::clear), but only the last
/// `window` turns are ever shown to the model.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    window: usize,
}

impl ConversationMemory {
    pub fn new(window: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            window,
        }
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(ConversationTurn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// The most recent turns within the window, oldest first.
    pub fn recent(&self) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(self.window);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(3)
    }
}
