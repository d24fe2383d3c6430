//! UI-agnostic conversation state
//!
//! The store holds the ordered turn list plus the loading flag and the text
//! sitting in the input box. Mutations bump a revision counter on a watch
//! channel so any observer (the TUI redraw loop, tests) can react without the
//! store knowing about rendering.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::openai::Completion;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    User,
    Assistant,
}

/// Settlement state of a turn. A turn is `Pending` from the moment the
/// placeholder is appended until the request resolves, then exactly one of
/// `Complete` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Pending,
    Complete,
    Failed,
}

/// One message exchange unit in the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub author: Author,
    pub text: String,
    pub state: TurnState,
    /// Raw completion payload, kept for settled assistant turns
    pub completion: Option<Completion>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            text: text.into(),
            state: TurnState::Complete,
            completion: None,
        }
    }

    /// Placeholder assistant turn shown while the request is in flight
    pub fn pending(status: impl Into<String>) -> Self {
        Self {
            author: Author::Assistant,
            text: status.into(),
            state: TurnState::Pending,
            completion: None,
        }
    }

    pub fn assistant(text: impl Into<String>, completion: Completion) -> Self {
        Self {
            author: Author::Assistant,
            text: text.into(),
            state: TurnState::Complete,
            completion: Some(completion),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            author: Author::Assistant,
            text: message.into(),
            state: TurnState::Failed,
            completion: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == TurnState::Pending
    }
}

/// Ordered conversation state with change notification.
///
/// Turns are append-only from the observer's point of view: `push` adds at
/// the end, `replace_last_where` settles a turn in place, nothing is removed.
pub struct ConversationStore {
    turns: Vec<Turn>,
    is_loading: bool,
    pending_input: String,
    revision: u64,
    changed: watch::Sender<u64>,
}

impl ConversationStore {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            turns: Vec::new(),
            is_loading: false,
            pending_input: String::new(),
            revision: 0,
            changed,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Watch the revision counter; the value changes synchronously with every
    /// mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.notify();
    }

    /// Replace the most recent turn matching `predicate`. Returns false and
    /// leaves the transcript untouched when nothing matches.
    pub fn replace_last_where<P>(&mut self, predicate: P, turn: Turn) -> bool
    where
        P: Fn(&Turn) -> bool,
    {
        match self.turns.iter().rposition(|t| predicate(t)) {
            Some(idx) => {
                self.turns[idx] = turn;
                self.notify();
                true
            }
            None => false,
        }
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
        self.notify();
    }

    pub fn set_pending_input(&mut self, text: String) {
        self.pending_input = text;
        self.notify();
    }

    fn notify(&mut self) {
        self.revision += 1;
        // send_replace delivers even when nobody is subscribed yet
        self.changed.send_replace(self.revision);
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
