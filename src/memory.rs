//! Conversational memory bounded by turn count and token budget.

use crate::models::MemoryTurn;
use crate::tokens::count_tokens;

/// Keep the most recent turns that satisfy both bounds, in chronological order.
///
/// First the last `max_turns` entries are taken. Then, walking from newest to
/// oldest, turns are kept while the running `query + answer` token total stays
/// within `max_tokens`; the first turn that would overflow ends the walk and
/// everything older is dropped. The result is always a suffix of `history`.
pub fn truncate(history: &[MemoryTurn], max_turns: usize, max_tokens: usize) -> Vec<MemoryTurn> {
    truncate_with(history, max_turns, max_tokens, |turn| {
        count_tokens(&format!("{}{}", turn.query, turn.answer))
    })
}

/// [`truncate`] with a caller-supplied token counter.
pub fn truncate_with<F>(
    history: &[MemoryTurn],
    max_turns: usize,
    max_tokens: usize,
    count: F,
) -> Vec<MemoryTurn>
where
    F: Fn(&MemoryTurn) -> usize,
{
    let windowed = &history[history.len().saturating_sub(max_turns)..];

    let mut total = 0usize;
    let mut keep_from = windowed.len();
    for (i, turn) in windowed.iter().enumerate().rev() {
        let tokens = count(turn);
        if total + tokens > max_tokens {
            break;
        }
        total += tokens;
        keep_from = i;
    }

    windowed[keep_from..].to_vec()
}

/// Append-only history of question/answer turns.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Vec<MemoryTurn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: MemoryTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[MemoryTurn] {
        &self.turns
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

    /// The turns that fit the given window, for prompt assembly. Failed turns
    /// are left out so error text never reaches the model.
    pub fn window(&self, max_turns: usize, max_tokens: usize) -> Vec<MemoryTurn> {
        let answered: Vec<MemoryTurn> = self
            .turns
            .iter()
            .filter(|t| !t.is_failed())
            .cloned()
            .collect();
        truncate(&answered, max_turns, max_tokens)
    }
}
