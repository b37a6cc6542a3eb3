//! One conversation turn: user input in, assistant reply (or an error) out.
//!
//! The controller owns only its turn state. The [`SessionStore`] is passed in on
//! every call so the caller decides how it is shared. A turn is split into
//! [`ChatController::begin_turn`] and [`ChatController::finish_turn`] so a caller
//! holding the store behind a lock can release it while the remote call runs.

use tracing::{info, warn};

use crate::error::{RemoteCallFailure, TurnRejected};
use crate::models::ChatModel;
use crate::request::{build_request, RequestPayload};
use crate::session::{Message, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    AwaitingReply,
}

/// Where the controller reports what the user should see.
pub trait ChatView {
    fn show_message(&mut self, message: &Message);
    fn show_error(&mut self, error: &RemoteCallFailure);
}

/// A turn whose user message is stored and whose request is ready to send.
#[derive(Debug)]
pub struct PendingTurn {
    request: RequestPayload,
    api_key: String,
    generation: u64,
}

impl PendingTurn {
    pub fn request(&self) -> &RequestPayload {
        &self.request
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

#[derive(Debug)]
pub enum TurnOutcome {
    Replied,
    Failed(RemoteCallFailure),
    /// The conversation was cleared while the reply was in flight.
    Discarded,
}

#[derive(Debug, Default)]
pub struct ChatController {
    state: ControllerState,
}

impl ChatController {
    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn begin_turn(
        &mut self,
        store: &mut SessionStore,
        input: &str,
        view: &mut dyn ChatView,
    ) -> Result<PendingTurn, TurnRejected> {
        if self.state == ControllerState::AwaitingReply {
            return Err(TurnRejected::Busy);
        }
        if input.is_empty() {
            return Err(TurnRejected::EmptyInput);
        }

        let message = Message::user(input);
        view.show_message(&message);
        store.append_message(message);

        let request = build_request(store.history(), store.config());
        self.state = ControllerState::AwaitingReply;
        info!(model = %request.model, history_len = store.history().len(), "turn started");
        Ok(PendingTurn {
            request,
            api_key: store.config().api_key.clone(),
            generation: store.generation(),
        })
    }

    pub fn finish_turn(
        &mut self,
        store: &mut SessionStore,
        turn: PendingTurn,
        result: Result<String, RemoteCallFailure>,
        view: &mut dyn ChatView,
    ) -> TurnOutcome {
        self.state = ControllerState::Idle;
        if turn.generation != store.generation() {
            info!("conversation cleared mid-turn; reply discarded");
            return TurnOutcome::Discarded;
        }
        match result {
            Ok(text) => {
                let message = Message::assistant(text);
                view.show_message(&message);
                store.append_message(message);
                info!(history_len = store.history().len(), "turn completed");
                TurnOutcome::Replied
            }
            Err(err) => {
                warn!(error = %err, "turn failed");
                view.show_error(&err);
                TurnOutcome::Failed(err)
            }
        }
    }

    /// Drops a turn whose reply will never arrive, keeping the user message.
    pub fn abandon_turn(&mut self) {
        if self.state == ControllerState::AwaitingReply {
            warn!("turn abandoned without a reply");
        }
        self.state = ControllerState::Idle;
    }

    /// Runs a full turn against `model`, blocking on the complete reply.
    pub async fn submit(
        &mut self,
        store: &mut SessionStore,
        model: &dyn ChatModel,
        input: &str,
        view: &mut dyn ChatView,
    ) -> Result<TurnOutcome, TurnRejected> {
        let turn = self.begin_turn(store, input, view)?;
        let result = model.complete(turn.api_key(), turn.request()).await;
        Ok(self.finish_turn(store, turn, result, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fake::ScriptedModel;
    use crate::session::Role;
    use crate::settings::SessionConfig;

    #[derive(Default)]
    struct RecordingView {
        shown: Vec<(Role, String)>,
        errors: Vec<String>,
    }

    impl ChatView for RecordingView {
        fn show_message(&mut self, message: &Message) {
            self.shown.push((message.role, message.content.clone()));
        }

        fn show_error(&mut self, error: &RemoteCallFailure) {
            self.errors.push(error.to_string());
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(SessionConfig::with_api_key("sk-test"))
    }

    #[tokio::test]
    async fn success_appends_user_then_assistant() {
        let mut store = store();
        let mut ctl = ChatController::default();
        let model = ScriptedModel::replying(vec![Ok("Hi!".into())]);
        let mut view = RecordingView::default();

        let outcome = ctl.submit(&mut store, &model, "Hello", &mut view).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Replied));
        assert_eq!(ctl.state(), ControllerState::Idle);
        let history: Vec<(Role, &str)> =
            store.history().iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(history, vec![(Role::User, "Hello"), (Role::Assistant, "Hi!")]);
        assert_eq!(
            view.shown,
            vec![(Role::User, "Hello".to_string()), (Role::Assistant, "Hi!".to_string())]
        );
        assert!(view.errors.is_empty());
    }

    #[tokio::test]
    async fn user_message_is_in_request_before_the_call() {
        let mut store = store();
        store.append_message(Message::user("earlier"));
        store.append_message(Message::assistant("answer"));
        let mut ctl = ChatController::default();
        let model = ScriptedModel::replying(vec![Ok("ok".into())]);

        ctl.submit(&mut store, &model, "next", &mut RecordingView::default()).await.unwrap();

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (key, req) = &calls[0];
        assert_eq!(key, "sk-test");
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[2].role, Role::User);
        assert_eq!(req.messages[2].content, "next");
    }

    #[tokio::test]
    async fn failure_keeps_only_the_user_message() {
        let mut store = store();
        let mut ctl = ChatController::default();
        let model = ScriptedModel::replying(vec![Err(RemoteCallFailure::Api {
            status: 429,
            message: "rate limited".into(),
        })]);
        let mut view = RecordingView::default();

        let outcome = ctl.submit(&mut store, &model, "Hello", &mut view).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Failed(RemoteCallFailure::Api { status: 429, .. })));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].role, Role::User);
        assert_eq!(view.shown.len(), 1);
        assert_eq!(view.errors, vec!["API returned 429: rate limited".to_string()]);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_a_call() {
        let mut store = store();
        let mut ctl = ChatController::default();
        let model = ScriptedModel::default();

        let err = ctl
            .submit(&mut store, &model, "", &mut RecordingView::default())
            .await
            .unwrap_err();
        assert_eq!(err, TurnRejected::EmptyInput);
        assert!(store.history().is_empty());
        assert_eq!(model.call_count(), 0);
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn whitespace_input_still_starts_a_turn() {
        let mut store = store();
        let mut ctl = ChatController::default();
        let model = ScriptedModel::replying(vec![Ok("r".into())]);

        let outcome = ctl
            .submit(&mut store, &model, "   ", &mut RecordingView::default())
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Replied));
        assert_eq!(store.history().len(), 2);
        assert_eq!(store.history()[0].content, "   ");
        assert_eq!(model.call_count(), 1);
    }

    #[test]
    fn abandoned_turn_returns_to_idle() {
        let mut store = store();
        let mut ctl = ChatController::default();
        let _turn = ctl.begin_turn(&mut store, "hello", &mut RecordingView::default()).unwrap();
        assert_eq!(ctl.state(), ControllerState::AwaitingReply);

        ctl.abandon_turn();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(ctl.begin_turn(&mut store, "again", &mut RecordingView::default()).is_ok());
    }

    #[test]
    fn second_submission_while_awaiting_is_rejected() {
        let mut store = store();
        let mut ctl = ChatController::default();
        let mut view = RecordingView::default();

        let turn = ctl.begin_turn(&mut store, "first", &mut view).unwrap();
        assert_eq!(ctl.state(), ControllerState::AwaitingReply);
        let err = ctl.begin_turn(&mut store, "second", &mut view).unwrap_err();
        assert_eq!(err, TurnRejected::Busy);
        assert_eq!(store.history().len(), 1);

        ctl.finish_turn(&mut store, turn, Ok("reply".into()), &mut view);
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(store.history().len(), 2);
    }

    #[test]
    fn reply_after_clear_is_discarded() {
        let mut store = store();
        let mut ctl = ChatController::default();
        let mut view = RecordingView::default();

        let turn = ctl.begin_turn(&mut store, "hello", &mut view).unwrap();
        store.clear();
        let outcome = ctl.finish_turn(&mut store, turn, Ok("late".into()), &mut view);

        assert!(matches!(outcome, TurnOutcome::Discarded));
        assert!(store.history().is_empty());
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[test]
    fn request_uses_config_at_turn_start() {
        let mut store = store();
        store.set_config(crate::settings::SessionConfigPatch {
            max_tokens: Some(300),
            model: Some(crate::settings::ModelId::Claude3Opus),
            ..Default::default()
        });
        let mut ctl = ChatController::default();
        let turn = ctl.begin_turn(&mut store, "hi", &mut RecordingView::default()).unwrap();
        assert_eq!(turn.request().model, "claude-3-opus-20240229");
        assert_eq!(turn.request().max_tokens, 300);
        assert_eq!(turn.api_key(), "sk-test");
    }
}
