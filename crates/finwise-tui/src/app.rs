use finwise_core::input::{char_count, limit_characters};
use finwise_core::{
    Config, ControllerEvent, HttpEndpoint, LifecycleState, RequestController, RequestId, SubmitError,
    SubmitOutcome,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::tui::TICK_MILLIS;

pub type Controller = RequestController<HttpEndpoint>;
pub type RequestTask = JoinHandle<(Controller, Result<SubmitOutcome, SubmitError>)>;

pub const TRUNCATED_MESSAGE: &str = "You have reached the maximum number of characters.";
pub const COPIED_MESSAGE: &str = "Financial Guidance Copied";
const TOAST_MILLIS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// Short-lived notification in the bottom-right corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub ticks_left: u16,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Prompt input
    pub input: String,
    pub input_cursor: usize, // cursor position in chars
    pub max_chars: usize,

    // Mirrors of controller state, updated only from controller events
    pub lifecycle: LifecycleState,
    pub result_text: String,
    pub current_request: Option<RequestId>,

    // Result panel
    pub result_scroll: u16,
    pub result_height: u16,
    pub result_width: u16,

    pub toast: Option<Toast>,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub endpoint_url: String,

    // The controller is moved into the request task while a request runs
    controller: Option<Controller>,
    pub request_task: Option<RequestTask>,
}

impl App {
    pub fn new(config: &Config, controller: Controller) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,

            input: String::new(),
            input_cursor: 0,
            max_chars: config.prompt_limit(),

            lifecycle: LifecycleState::Idle,
            result_text: String::new(),
            current_request: None,

            result_scroll: 0,
            result_height: 0,
            result_width: 0,

            toast: None,
            animation_frame: 0,
            endpoint_url: config.endpoint_url(),

            controller: Some(controller),
            request_task: None,
        }
    }

    /// Submission is allowed with a non-empty prompt and no request running.
    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty() && self.request_task.is_none() && self.controller.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.request_task.is_some() || self.lifecycle.is_in_flight()
    }

    pub fn input_len(&self) -> usize {
        char_count(&self.input)
    }

    /// Hand the prompt to the controller on a background task.
    pub fn submit(&mut self) {
        if !self.can_submit() {
            return;
        }
        let Some(mut controller) = self.controller.take() else {
            return;
        };

        let prompt = self.input.clone();
        self.result_text.clear();
        self.result_scroll = 0;
        self.input_mode = InputMode::Normal;

        info!(chars = self.input_len(), "submitting prompt from input box");
        self.request_task = Some(tokio::spawn(async move {
            let outcome = controller.submit(&prompt).await;
            (controller, outcome)
        }));
    }

    /// Collect a finished request task and take the controller back.
    pub async fn poll_request_task(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }
        let Some(task) = self.request_task.take() else {
            return;
        };

        match task.await {
            Ok((controller, outcome)) => {
                match outcome {
                    Ok(outcome) => debug!(?outcome, "request finished"),
                    Err(err) => {
                        warn!(error = %err, "prompt rejected before sending");
                        self.show_toast(err.to_string(), ToastKind::Error);
                    }
                }
                self.controller = Some(controller);
            }
            Err(err) => {
                // Only reachable if the task panicked; the session cannot continue.
                warn!(error = %err, "request task failed");
                self.show_toast("An error occurred. Please try again.", ToastKind::Error);
                self.should_quit = true;
            }
        }
    }

    /// Apply a notification from the controller. Events from a request older
    /// than the latest one seen are dropped.
    pub fn apply_controller_event(&mut self, event: ControllerEvent) {
        let request = event.request();
        if self.current_request.map(|current| request < current).unwrap_or(false) {
            debug!(%request, "dropping event from stale request");
            return;
        }
        self.current_request = Some(request);

        match event {
            ControllerEvent::LifecycleChanged { state, .. } => {
                if let LifecycleState::Failed(failure) = &state {
                    self.show_toast(failure.user_message(), ToastKind::Error);
                }
                if state == LifecycleState::Submitting {
                    self.result_text.clear();
                }
                self.lifecycle = state;
            }
            ControllerEvent::TextUpdated { snapshot, .. } => {
                self.result_text = snapshot;
            }
            ControllerEvent::ScrollToResult { .. } => {
                self.focus = FocusPane::Result;
                self.input_mode = InputMode::Normal;
                self.result_scroll = 0;
            }
        }
    }

    /// Abandon any running request (the view is going away).
    pub fn shutdown(&mut self) {
        if let Some(task) = self.request_task.take() {
            info!("abandoning in-flight request");
            task.abort();
        }
        self.should_quit = true;
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
        self.enforce_limit();
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input_len() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input_len());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input_len();
    }

    fn enforce_limit(&mut self) {
        let (kept, truncated) = limit_characters(&self.input, self.max_chars);
        if truncated {
            self.input = kept.to_string();
            self.input_cursor = self.input_cursor.min(self.max_chars);
            self.show_toast(TRUNCATED_MESSAGE, ToastKind::Error);
        }
    }

    // Result panel

    pub fn scroll_result_down(&mut self) {
        let max_scroll = self.result_line_count().saturating_sub(self.result_height);
        self.result_scroll = (self.result_scroll + 1).min(max_scroll);
    }

    /// Keep the scroll offset inside the text after the panel changed size.
    pub fn clamp_result_scroll(&mut self) {
        let max_scroll = self.result_line_count().saturating_sub(self.result_height);
        self.result_scroll = self.result_scroll.min(max_scroll);
    }

    pub fn scroll_result_up(&mut self) {
        self.result_scroll = self.result_scroll.saturating_sub(1);
    }

    /// Wrapped line count of the result panel, used to clamp scrolling.
    fn result_line_count(&self) -> u16 {
        let wrap_width = if self.result_width > 0 {
            self.result_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for line in self.result_text.split('\n') {
            let count = line.chars().count();
            total_lines = total_lines.saturating_add(((count / wrap_width) + 1) as u16);
        }
        // Blank line and copy hint
        total_lines.saturating_add(2)
    }

    // Notifications

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toast = Some(Toast {
            message: message.into(),
            kind,
            ticks_left: (TOAST_MILLIS / TICK_MILLIS) as u16,
        });
    }

    /// Advance animations and expire toasts (called by Tick event)
    pub fn tick(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(toast) = &mut self.toast {
            toast.ticks_left = toast.ticks_left.saturating_sub(1);
            if toast.ticks_left == 0 {
                self.toast = None;
            }
        }
    }
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finwise_core::{Failure, RateLimitInfo};
    use finwise_core::state::RATE_LIMIT_MESSAGE;

    fn test_app() -> App {
        let config = Config {
            endpoint: Some("http://localhost:3000/api/generate".to_string()),
            max_prompt_chars: Some(10),
            request_timeout_secs: None,
        };
        let (controller, _rx) = RequestController::new(HttpEndpoint::new("http://localhost:3000/api/generate"));
        App::new(&config, controller)
    }

    fn text_event(request: u64, snapshot: &str) -> ControllerEvent {
        ControllerEvent::TextUpdated {
            request: RequestId(request),
            chunk: snapshot.to_string(),
            snapshot: snapshot.to_string(),
        }
    }

    #[test]
    fn test_text_updates_replace_snapshot() {
        let mut app = test_app();
        app.apply_controller_event(text_event(1, "Consider "));
        app.apply_controller_event(text_event(1, "Consider a debt "));
        assert_eq!(app.result_text, "Consider a debt ");
    }

    #[test]
    fn test_stale_request_events_ignored() {
        let mut app = test_app();
        app.apply_controller_event(text_event(2, "new"));
        app.apply_controller_event(text_event(1, "old"));
        assert_eq!(app.result_text, "new");
        assert_eq!(app.current_request, Some(RequestId(2)));
    }

    #[test]
    fn test_failure_shows_user_message() {
        let mut app = test_app();
        let failure = Failure::rejected(429, String::new(), RateLimitInfo::default());
        app.apply_controller_event(ControllerEvent::LifecycleChanged {
            request: RequestId(1),
            state: LifecycleState::Failed(failure),
        });
        let toast = app.toast.as_ref().expect("toast");
        assert_eq!(toast.message, RATE_LIMIT_MESSAGE);
        assert_eq!(toast.kind, ToastKind::Error);
    }

    #[test]
    fn test_scroll_to_result_focuses_result() {
        let mut app = test_app();
        app.result_scroll = 5;
        app.apply_controller_event(ControllerEvent::ScrollToResult { request: RequestId(1) });
        assert_eq!(app.focus, FocusPane::Result);
        assert_eq!(app.result_scroll, 0);
    }

    #[test]
    fn test_input_limited_to_max_chars() {
        let mut app = test_app();
        for c in "I owe ₱9000 now".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.input, "I owe ₱900");
        assert_eq!(app.input_len(), 10);
        assert_eq!(app.toast.as_ref().map(|t| t.message.as_str()), Some(TRUNCATED_MESSAGE));
    }

    #[test]
    fn test_cannot_submit_empty_input() {
        let mut app = test_app();
        assert!(!app.can_submit());
        app.insert_char(' ');
        assert!(!app.can_submit());
        app.insert_char('x');
        assert!(app.can_submit());
    }

    #[test]
    fn test_toast_expires() {
        let mut app = test_app();
        app.show_toast(COPIED_MESSAGE, ToastKind::Success);
        for _ in 0..(TOAST_MILLIS / TICK_MILLIS) {
            assert!(app.toast.is_some());
            app.tick();
        }
        assert!(app.toast.is_none());
    }

    #[test]
    fn test_cursor_editing_multibyte() {
        let mut app = test_app();
        for c in "₱50".chars() {
            app.insert_char(c);
        }
        app.cursor_home();
        app.cursor_right();
        app.delete_before_cursor();
        assert_eq!(app.input, "50");
        app.cursor_end();
        app.delete_at_cursor();
        assert_eq!(app.input, "50");
    }

    #[tokio::test]
    async fn test_submit_streams_into_app() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Pay high interest first."))
            .mount(&server)
            .await;

        let (controller, mut rx) = RequestController::new(HttpEndpoint::new(&server.uri()));
        let mut app = App::new(&Config::new(), controller);
        for c in "credit cards".chars() {
            app.insert_char(c);
        }

        app.submit();
        assert!(app.is_loading());
        assert!(!app.can_submit());

        let handle = app.request_task.take().expect("task");
        let (controller, outcome) = handle.await.unwrap();
        assert_eq!(outcome.unwrap(), SubmitOutcome::Completed);
        app.controller = Some(controller);

        while let Ok(event) = rx.try_recv() {
            app.apply_controller_event(event);
        }
        assert_eq!(app.result_text, "Pay high interest first.");
        assert_eq!(app.lifecycle, LifecycleState::Completed);
        assert_eq!(app.focus, FocusPane::Result);
        assert!(app.can_submit());
    }
}
