use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::App;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {
            if app.follow_bottom {
                app.scroll_to_bottom();
            }
        }
        AppEvent::Tick => {
            app.tick_animation();
            // Responses resolve on the event loop, never on the request task
            app.poll_response().await;
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global quit
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,

        KeyCode::Enter => app.submit_input(),

        // Input editing
        KeyCode::Backspace => app.delete_back(),
        KeyCode::Delete => app.delete_forward(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),

        // Transcript scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(2) / 2),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(2) / 2),

        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_app() -> App {
        let config = Config {
            base_url: Some("http://localhost:0/v1".to_string()),
            default_model: Some("test-model".to_string()),
            ..Config::new()
        };
        App::new(&config, None, None).unwrap()
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn test_typing_lands_in_pending_input() {
        let mut app = test_app();
        for c in "hey".chars() {
            handle_event(&mut app, key(KeyCode::Char(c))).await;
        }
        assert_eq!(app.controller.store().pending_input(), "hey");
        assert_eq!(app.input_cursor, 3);
    }

    #[tokio::test]
    async fn test_enter_on_empty_input_appends_nothing() {
        let mut app = test_app();
        handle_event(&mut app, key(KeyCode::Enter)).await;
        assert!(app.controller.store().turns().is_empty());
        assert!(!app.controller.store().is_loading());
        assert!(app.request_task.is_none());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let mut app = test_app();
        let event = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, event).await;
        assert!(app.should_quit);
    }
}
