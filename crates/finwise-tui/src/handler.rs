use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tracing::debug;

use crate::app::{App, FocusPane, InputMode, ToastKind, COPIED_MESSAGE};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(width, height) => {
            debug!(width, height, "terminal resized");
            app.clamp_result_scroll();
        }
        AppEvent::Tick => {
            app.tick();
            app.poll_request_task().await;
        }
        AppEvent::Controller(event) => {
            app.apply_controller_event(event);
            app.poll_request_task().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl+C always quits
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.shutdown();
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.shutdown(),
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Input => FocusPane::Result,
                FocusPane::Result => FocusPane::Input,
            };
        }
        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Enter if app.focus == FocusPane::Input => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('j') | KeyCode::Down if app.focus == FocusPane::Result => {
            app.scroll_result_down();
        }
        KeyCode::Char('k') | KeyCode::Up if app.focus == FocusPane::Result => {
            app.scroll_result_up();
        }
        KeyCode::Char('c') | KeyCode::Char('y') => {
            if app.result_text.is_empty() {
                return;
            }
            if copy_to_clipboard(&app.result_text) {
                app.show_toast(COPIED_MESSAGE, ToastKind::Success);
            } else {
                app.show_toast("No clipboard command available.", ToastKind::Error);
            }
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            // Disabled while typing out a response, like the submit button
            app.submit();
        }
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_result_down(),
        MouseEventKind::ScrollUp => app.scroll_result_up(),
        _ => {}
    }
}

/// Pipe `text` into the first clipboard command that accepts it.
fn copy_to_clipboard(text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    const CANDIDATES: &[(&str, &[&str])] = &[
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
    ];

    for (program, args) in CANDIDATES {
        let Ok(mut child) = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };

        let written = child
            .stdin
            .take()
            .map(|mut stdin| stdin.write_all(text.as_bytes()).is_ok())
            .unwrap_or(false);
        let succeeded = child.wait().map(|status| status.success()).unwrap_or(false);
        if written && succeeded {
            debug!(program, "copied result to clipboard");
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use finwise_core::{Config, HttpEndpoint, RequestController};

    fn test_app() -> App {
        let (controller, _rx) = RequestController::new(HttpEndpoint::new("http://localhost:3000/api/generate"));
        App::new(&Config::new(), controller)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[tokio::test]
    async fn test_resize_clamps_result_scroll() {
        let mut app = test_app();
        app.result_text = "Pay the smallest debt first.".to_string();
        app.result_width = 40;
        app.result_height = 5;
        app.result_scroll = 12;

        handle_event(&mut app, AppEvent::Resize(120, 40)).await.unwrap();
        assert_eq!(app.result_scroll, 0);
    }

    #[test]
    fn test_typing_in_editing_mode() {
        let mut app = test_app();
        for c in "debt".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input, "deb");
    }

    #[test]
    fn test_escape_then_quit() {
        let mut app = test_app();
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.input, "q");
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_enter_on_empty_input_does_nothing() {
        let mut app = test_app();
        press(&mut app, KeyCode::Enter);
        assert!(app.request_task.is_none());
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn test_tab_switches_focus() {
        let mut app = test_app();
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, FocusPane::Result);
        press(&mut app, KeyCode::Char('i'));
        assert_eq!(app.focus, FocusPane::Input);
        assert_eq!(app.input_mode, InputMode::Editing);
    }
}
