//! Client-session state machines.
//!
//! These are the browser-resident behaviors expressed as plain state
//! machines so any front-end (the `cbr chat` REPL, a web widget) can embed
//! them: autocomplete debounce bookkeeping with stale-reply protection,
//! and multi-turn chat history with the error-turn asymmetry.
//!
//! Timers live in the host; [`Autocomplete`] only decides *what* should be
//! scheduled and which replies are still trustworthy.

use crate::models::{Answer, ChatMessage};

/// Idle delay between the last keystroke and the search request.
pub const DEBOUNCE_MS: u64 = 300;

/// Minimum input length before the ask-AI affordance is enabled.
pub const MIN_ASK_AI_LEN: usize = 3;

/// What the host should do after a keystroke.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    /// Input emptied: cancel any pending request and clear results.
    Clear,
    /// Schedule a search for `query` after [`DEBOUNCE_MS`]; the
    /// generation tags the eventual reply.
    Schedule { generation: u64, query: String },
}

/// Autocomplete debounce state.
///
/// Every keystroke supersedes the previous pending request by bumping the
/// generation counter; a reply is only accepted if its generation is still
/// current. Superseded requests are abandoned, not cancelled.
#[derive(Debug, Default)]
pub struct Autocomplete {
    generation: u64,
    ask_ai_enabled: bool,
}

impl Autocomplete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ask_ai_enabled(&self) -> bool {
        self.ask_ai_enabled
    }

    pub fn input(&mut self, raw: &str) -> InputAction {
        let query = raw.trim();
        self.ask_ai_enabled = query.chars().count() >= MIN_ASK_AI_LEN;

        // Invalidates any in-flight request
        self.generation += 1;

        if query.is_empty() {
            InputAction::Clear
        } else {
            InputAction::Schedule {
                generation: self.generation,
                query: query.to_string(),
            }
        }
    }

    /// Whether a reply tagged with `generation` is still the latest.
    pub fn accept(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

/// One rendered transcript entry.
#[derive(Debug, Clone)]
pub enum Turn {
    User(String),
    Model(Answer),
    /// Synthetic failure notice. Rendered, never sent upstream.
    Error(String),
}

/// Multi-turn conversation state. The server is stateless; the full
/// history is resent with every submission.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<ChatMessage>,
    transcript: Vec<Turn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimistically append the user turn and return the outbound
    /// history for the request.
    pub fn submit(&mut self, text: &str) -> Vec<ChatMessage> {
        let text = text.trim().to_string();
        self.history.push(ChatMessage::user(text.clone()));
        self.transcript.push(Turn::User(text));
        self.history.clone()
    }

    pub fn record_reply(&mut self, answer: Answer) {
        self.history.push(ChatMessage::model(answer.answer.clone()));
        self.transcript.push(Turn::Model(answer));
    }

    /// Record a transport/provider failure. The message appears in the
    /// transcript only — history sent to the provider never contains
    /// client-synthesized error text.
    pub fn record_failure(&mut self, message: &str) {
        self.transcript.push(Turn::Error(message.to_string()));
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.transcript.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_ai_gating() {
        let mut ac = Autocomplete::new();
        ac.input("ab");
        assert!(!ac.ask_ai_enabled());
        ac.input("abc");
        assert!(ac.ask_ai_enabled());
        ac.input("  abc  ");
        assert!(ac.ask_ai_enabled());
    }

    #[test]
    fn test_empty_input_clears() {
        let mut ac = Autocomplete::new();
        assert!(matches!(ac.input("widget"), InputAction::Schedule { .. }));
        assert_eq!(ac.input("   "), InputAction::Clear);
    }

    #[test]
    fn test_stale_reply_rejected() {
        let mut ac = Autocomplete::new();
        let first = match ac.input("wid") {
            InputAction::Schedule { generation, .. } => generation,
            other => panic!("unexpected action: {:?}", other),
        };
        let second = match ac.input("widget") {
            InputAction::Schedule { generation, .. } => generation,
            other => panic!("unexpected action: {:?}", other),
        };

        // The reply for "wid" arrives after "widget" was typed
        assert!(!ac.accept(first));
        assert!(ac.accept(second));
    }

    #[test]
    fn test_clearing_input_invalidates_pending_reply() {
        let mut ac = Autocomplete::new();
        let generation = match ac.input("widget") {
            InputAction::Schedule { generation, .. } => generation,
            other => panic!("unexpected action: {:?}", other),
        };
        ac.input("");
        assert!(!ac.accept(generation));
    }

    #[test]
    fn test_submit_is_optimistic_and_resends_full_history() {
        let mut session = ChatSession::new();

        let outbound = session.submit("What are your hours?");
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].role, "user");

        session.record_reply(Answer::text_only("9 to 5."));

        let outbound = session.submit("And on weekends?");
        assert_eq!(outbound.len(), 3);
        assert_eq!(outbound[1].role, "model");
        assert_eq!(outbound[1].content, "9 to 5.");
    }

    #[test]
    fn test_error_turns_never_enter_outbound_history() {
        let mut session = ChatSession::new();
        session.submit("hello");
        session.record_failure("Connection error. Please try again.");

        let outbound = session.submit("are you there?");
        assert_eq!(outbound.len(), 2);
        assert!(outbound.iter().all(|m| !m.content.contains("Connection error")));

        // But the transcript shows the failure
        assert!(session
            .transcript()
            .iter()
            .any(|t| matches!(t, Turn::Error(_))));
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut session = ChatSession::new();
        session.submit("hello");
        session.record_reply(Answer::text_only("hi"));
        session.reset();
        assert!(session.history().is_empty());
        assert!(session.transcript().is_empty());
    }
}
