use tokio::task::JoinHandle;

use crate::config::Config;
use crate::controller::{ChatController, SubmitError};
use crate::openai::{ApiError, Completion, OpenAiClient};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub controller: ChatController,
    pub client: OpenAiClient,

    // Input state
    pub input_cursor: usize, // cursor position in the pending input, in chars

    // Transcript scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Outstanding completion request, at most one
    pub request_task: Option<JoinHandle<Result<Completion, ApiError>>>,
}

impl App {
    pub fn new(
        config: &Config,
        model_override: Option<String>,
        base_url_override: Option<String>,
    ) -> anyhow::Result<Self> {
        let base_url = config.resolved_base_url(base_url_override.as_deref());
        let model = config.resolved_model(model_override.as_deref());
        let client = OpenAiClient::new(&base_url, config.resolved_api_key())?;
        let controller = ChatController::new(model, config.system_prompt.clone());

        Ok(Self {
            should_quit: false,
            controller,
            client,
            input_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_bottom: true,
            animation_frame: 0,
            request_task: None,
        })
    }

    /// Submit whatever sits in the input box. Empty input and submissions
    /// while a request is outstanding are ignored.
    pub fn submit_input(&mut self) {
        let text = self.controller.store().pending_input().to_string();
        match self.controller.submit(&text) {
            Ok(request) => {
                self.input_cursor = 0;
                self.follow_bottom = true;
                self.scroll_to_bottom();

                let client = self.client.clone();
                self.request_task =
                    Some(tokio::spawn(async move { client.complete(&request).await }));
            }
            Err(SubmitError::EmptyInput | SubmitError::Busy) => {}
        }
    }

    /// Drain a finished request task into the controller. Called from the
    /// event loop on every tick so the response lands on the UI thread.
    pub async fn poll_response(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.request_task.take() {
            match task.await {
                Ok(outcome) => self.controller.resolve(outcome),
                Err(err) => {
                    tracing::error!(error = %err, "completion task did not finish");
                    self.controller
                        .fail(format!("Error: the request was interrupted ({err})"));
                }
            }
            if self.follow_bottom {
                self.scroll_to_bottom();
            }
        }
    }

    /// Cancel the outstanding request, if any. Called on teardown so a slow
    /// response cannot outlive the screen.
    pub fn abort_pending(&mut self) {
        if let Some(task) = self.request_task.take() {
            task.abort();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.store().is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing (cursor position is in chars, the store holds the text)

    pub fn insert_char(&mut self, c: char) {
        let mut text = self.controller.store().pending_input().to_string();
        let byte_pos = char_to_byte_index(&text, self.input_cursor);
        text.insert(byte_pos, c);
        self.input_cursor += 1;
        self.controller.store_mut().set_pending_input(text);
    }

    pub fn delete_back(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        let mut text = self.controller.store().pending_input().to_string();
        let byte_pos = char_to_byte_index(&text, self.input_cursor);
        text.remove(byte_pos);
        self.controller.store_mut().set_pending_input(text);
    }

    pub fn delete_forward(&mut self) {
        let mut text = self.controller.store().pending_input().to_string();
        if self.input_cursor < text.chars().count() {
            let byte_pos = char_to_byte_index(&text, self.input_cursor);
            text.remove(byte_pos);
            self.controller.store_mut().set_pending_input(text);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.controller.store().pending_input().chars().count();
        self.input_cursor = (self.input_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.controller.store().pending_input().chars().count();
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.transcript_lines().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
        self.follow_bottom = self.chat_scroll == max_scroll;
    }

    /// Scroll so the newest turn (or the "Thinking" placeholder) is visible
    pub fn scroll_to_bottom(&mut self) {
        let total = self.transcript_lines();
        let visible = self.visible_height();
        self.chat_scroll = total.saturating_sub(visible);
    }

    /// Estimate the rendered height of the transcript: one author line per
    /// turn, wrapped content lines, one blank line between turns.
    fn transcript_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for turn in self.controller.store().turns() {
            total += 1; // Author line ("You:" or "Assistant:")
            for line in turn.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total += 1; // Empty line still takes one line
                } else {
                    total += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total += 1; // Blank line after the turn
        }
        total
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::TurnState;
    use crate::openai::{Choice, ChoiceMessage};

    fn test_app() -> App {
        let config = Config {
            base_url: Some("http://localhost:0/v1".to_string()),
            default_model: Some("test-model".to_string()),
            ..Config::new()
        };
        App::new(&config, None, None).unwrap()
    }

    fn completion(text: &str) -> Completion {
        Completion {
            id: "cmpl-1".to_string(),
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: text.to_string(),
                },
            }],
        }
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "día";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 1);
        assert_eq!(char_to_byte_index(s, 2), 3); // 'í' is two bytes
        assert_eq!(char_to_byte_index(s, 99), s.len());
    }

    #[test]
    fn test_input_editing_is_utf8_safe() {
        let mut app = test_app();
        for c in "holá".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.controller.store().pending_input(), "holá");

        app.cursor_left();
        app.insert_char('l');
        assert_eq!(app.controller.store().pending_input(), "hollá");

        app.delete_back();
        assert_eq!(app.controller.store().pending_input(), "holá");

        app.cursor_home();
        app.delete_forward();
        assert_eq!(app.controller.store().pending_input(), "olá");
    }

    #[tokio::test]
    async fn test_poll_response_settles_success() {
        let mut app = test_app();
        app.controller.submit("Hello").unwrap();
        app.request_task = Some(tokio::spawn(async { Ok(completion("Hi there")) }));

        while app.request_task.is_some() {
            app.poll_response().await;
            tokio::task::yield_now().await;
        }

        let turns = app.controller.store().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "Hi there");
        assert_eq!(turns[1].state, TurnState::Complete);
        assert!(!app.controller.store().is_loading());
    }

    #[tokio::test]
    async fn test_poll_response_settles_panicked_task() {
        let mut app = test_app();
        app.controller.submit("Hello").unwrap();
        app.request_task = Some(tokio::spawn(async { panic!("worker died") }));

        while app.request_task.is_some() {
            app.poll_response().await;
            tokio::task::yield_now().await;
        }

        let turns = app.controller.store().turns();
        assert_eq!(turns[1].state, TurnState::Failed);
        assert!(!app.controller.store().is_loading());
    }

    #[test]
    fn test_tick_animation_only_while_loading() {
        let mut app = test_app();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.controller.submit("Hello").unwrap();
        app.tick_animation();
        app.tick_animation();
        assert_eq!(app.animation_frame, 2);
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);
    }
}
