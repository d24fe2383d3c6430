//! Conversation controller
//!
//! Owns the store for the lifetime of the session and orchestrates one
//! request/response cycle per submission: `submit` appends the user turn and
//! the pending placeholder and hands back the wire request; `resolve` settles
//! the placeholder once the request task finishes. Keeping both halves
//! synchronous leaves the spawn in the event loop and makes the whole cycle
//! testable without a network.

use thiserror::Error;

use crate::conversation::{Author, ConversationStore, Turn};
use crate::openai::{ApiError, ApiMessage, ChatRequest, Choice, Completion};

/// Status text carried by the placeholder turn while a request is in flight
pub const PENDING_STATUS: &str = "Thinking";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyInput,
    #[error("a request is already in flight")]
    Busy,
}

pub struct ChatController {
    store: ConversationStore,
    model: String,
    system_prompt: Option<String>,
}

impl ChatController {
    pub fn new(model: String, system_prompt: Option<String>) -> Self {
        Self {
            store: ConversationStore::new(),
            model,
            system_prompt,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore {
        &mut self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start a request/response cycle. Appends the user turn, flips the
    /// loading flag, appends the placeholder, clears the input box, and
    /// returns the request to run. Whitespace-only input is rejected without
    /// touching the transcript; so is a submission while a request is
    /// outstanding (the input is left intact in that case).
    pub fn submit(&mut self, text: &str) -> Result<ChatRequest, SubmitError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self.store.is_loading() {
            return Err(SubmitError::Busy);
        }

        tracing::debug!(chars = text.len(), "submitting user message");
        self.store.push(Turn::user(text));
        self.store.set_loading(true);
        self.store.push(Turn::pending(PENDING_STATUS));
        self.store.set_pending_input(String::new());

        Ok(self.build_request())
    }

    /// Settle the outstanding placeholder from the request outcome. Every
    /// path through here clears the loading flag; a placeholder left spinning
    /// forever is a defect.
    pub fn resolve(&mut self, outcome: Result<Completion, ApiError>) {
        match outcome {
            Ok(completion) => {
                let text = formatted_response_text(&completion.choices);
                if text.is_empty() {
                    tracing::warn!(id = %completion.id, "completion carried no text");
                    self.settle(Turn::failed("The service returned an empty completion."));
                } else {
                    self.settle(Turn::assistant(text, completion));
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "completion request failed");
                self.settle(Turn::failed(format!("Error: {err}")));
            }
        }
    }

    /// Settle the placeholder with a failure that did not come from the API
    /// call itself (e.g. the request task panicked).
    pub fn fail(&mut self, message: impl Into<String>) {
        self.settle(Turn::failed(message.into()));
    }

    fn settle(&mut self, turn: Turn) {
        self.store
            .replace_last_where(|t| t.author == Author::Assistant && t.is_loading(), turn);
        self.store.set_loading(false);
    }

    /// Build the wire request from the settled history. Pending and failed
    /// turns carry no conversational content and are skipped.
    fn build_request(&self) -> ChatRequest {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            messages.push(ApiMessage::system(prompt));
        }
        for turn in self.store.turns() {
            match turn.author {
                Author::User => messages.push(ApiMessage::user(&turn.text)),
                Author::Assistant => {
                    if turn.completion.is_some() {
                        messages.push(ApiMessage::assistant(&turn.text));
                    }
                }
            }
        }
        ChatRequest {
            model: self.model.clone(),
            messages,
        }
    }
}

/// Map the candidate completions to a single display string. Candidates are
/// trimmed, empty ones dropped, and the survivors joined with a blank line.
pub fn formatted_response_text(choices: &[Choice]) -> String {
    choices
        .iter()
        .map(|c| c.message.content.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::TurnState;
    use crate::openai::ChoiceMessage;

    fn controller() -> ChatController {
        ChatController::new("test-model".to_string(), None)
    }

    fn completion(texts: &[&str]) -> Completion {
        Completion {
            id: "cmpl-1".to_string(),
            choices: texts
                .iter()
                .map(|t| Choice {
                    message: ChoiceMessage {
                        content: t.to_string(),
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn test_submit_appends_user_and_placeholder() {
        let mut ctl = controller();
        ctl.store_mut().set_pending_input("Hello".to_string());

        let request = ctl.submit("Hello").unwrap();

        let turns = ctl.store().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].author, Author::User);
        assert_eq!(turns[0].text, "Hello");
        assert_eq!(turns[1].author, Author::Assistant);
        assert!(turns[1].is_loading());
        assert!(ctl.store().is_loading());
        assert_eq!(ctl.store().pending_input(), "");

        assert_eq!(request.model, "test-model");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, "Hello");
    }

    #[test]
    fn test_submit_empty_input_is_noop() {
        let mut ctl = controller();
        assert_eq!(ctl.submit("").unwrap_err(), SubmitError::EmptyInput);
        assert_eq!(ctl.submit("   \n\t").unwrap_err(), SubmitError::EmptyInput);
        assert!(ctl.store().turns().is_empty());
        assert!(!ctl.store().is_loading());
    }

    #[test]
    fn test_submit_rejected_while_loading() {
        let mut ctl = controller();
        ctl.submit("first").unwrap();

        ctl.store_mut().set_pending_input("second".to_string());
        assert_eq!(ctl.submit("second").unwrap_err(), SubmitError::Busy);

        // the rejected text stays in the input box
        assert_eq!(ctl.store().pending_input(), "second");
        assert_eq!(ctl.store().turns().len(), 2);
    }

    #[test]
    fn test_resolve_success_settles_placeholder() {
        let mut ctl = controller();
        ctl.submit("Hello").unwrap();
        ctl.resolve(Ok(completion(&["Hi there"])));

        let turns = ctl.store().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "Hi there");
        assert_eq!(turns[1].state, TurnState::Complete);
        assert!(turns[1].completion.is_some());
        assert!(!ctl.store().is_loading());
    }

    #[test]
    fn test_resolve_failure_settles_placeholder() {
        let mut ctl = controller();
        ctl.submit("Hello").unwrap();
        ctl.resolve(Err(ApiError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        }));

        let turns = ctl.store().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].state, TurnState::Failed);
        assert!(turns[1].text.starts_with("Error:"));
        assert!(turns[1].completion.is_none());
        assert!(!ctl.store().is_loading());
    }

    #[test]
    fn test_resolve_empty_choices_is_failure() {
        let mut ctl = controller();
        ctl.submit("Hello").unwrap();
        ctl.resolve(Ok(completion(&[])));

        assert_eq!(ctl.store().turns()[1].state, TurnState::Failed);
        assert!(!ctl.store().is_loading());
    }

    #[test]
    fn test_resolve_preserves_surrounding_turns() {
        let mut ctl = controller();
        ctl.submit("one").unwrap();
        ctl.resolve(Ok(completion(&["answer one"])));
        ctl.submit("two").unwrap();
        ctl.resolve(Ok(completion(&["answer two"])));

        let texts: Vec<&str> = ctl.store().turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "answer one", "two", "answer two"]);
    }

    #[test]
    fn test_request_carries_history_but_not_failures() {
        let mut ctl = ChatController::new("m".to_string(), Some("be brief".to_string()));
        ctl.submit("one").unwrap();
        ctl.resolve(Err(ApiError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        }));
        ctl.submit("two").unwrap();
        ctl.resolve(Ok(completion(&["answer"])));

        let request = ctl.submit("three").unwrap();
        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
        // system, then user "one" (its failed reply is skipped), user "two",
        // assistant "answer", user "three"
        assert_eq!(roles, vec!["system", "user", "user", "assistant", "user"]);
        assert_eq!(request.messages[0].content, "be brief");
        assert_eq!(request.messages[4].content, "three");
    }

    #[test]
    fn test_formatted_response_text_joins_candidates() {
        let c = completion(&["  first  ", "", "second"]);
        assert_eq!(formatted_response_text(&c.choices), "first\n\nsecond");
        assert_eq!(formatted_response_text(&[]), "");
    }

    #[test]
    fn test_submitted_text_is_trimmed() {
        let mut ctl = controller();
        ctl.submit("  Hello  ").unwrap();
        assert_eq!(ctl.store().turns()[0].text, "Hello");
    }
}
