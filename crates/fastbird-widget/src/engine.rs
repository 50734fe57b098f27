//! Conversation state machine for the assistant widget.
//!
//! Orchestrates the session store, the remote backend, and the audio
//! pipeline into the user-visible chat flow. One reply round trip is in
//! flight at most: submission is refused while waiting, which also
//! guarantees that each request's transcript appends land in order.

use std::sync::Arc;

use tracing::{debug, info, warn};

use fastbird_audio::{decode_pcm16_base64, AudioOutput};
use fastbird_core::content::{ContentCatalog, Lang};
use fastbird_core::session::{Message, SessionState};
use fastbird_core::store::ChatSessionStore;
use fastbird_gemini::{AssistantBackend, VoiceId};

use crate::persona;

/// Where the widget currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetPhase {
    Closed,
    /// Open, the user hasn't told us their name yet.
    AwaitingName,
    /// Open and ready for the next utterance.
    Idle,
    /// A reply round trip is in flight; submission is refused.
    Waiting,
}

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Closed,
    Busy,
    Empty,
}

/// What a submission produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// No-op; nothing was appended or persisted.
    Rejected(RejectReason),
    /// The input was taken as the user's name.
    NameCaptured { greeting: Message },
    /// The backend replied.
    Replied { reply: Message, audio_played: bool },
    /// Reply generation failed; the localized fallback was appended.
    Fallback { reply: Message },
}

/// Voice selection and speech rate, page-lifetime only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    voice: VoiceId,
    speech_rate: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice: VoiceId::default(),
            speech_rate: 1.0,
        }
    }
}

impl VoiceSettings {
    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    pub fn set_voice(&mut self, voice: VoiceId) {
        self.voice = voice;
    }

    pub fn speech_rate(&self) -> f32 {
        self.speech_rate
    }

    /// Clamped to [0.5, 2.0]. Accepted from the settings UI but not yet
    /// applied to synthesis requests; the backend has no rate control.
    pub fn set_speech_rate(&mut self, rate: f32) {
        self.speech_rate = rate.clamp(0.5, 2.0);
    }
}

/// The assistant widget engine.
///
/// Session state is rehydrated from the store once at mount and
/// re-persisted after every mutation. All failure modes keep the widget
/// usable; the only user-visible failure is the localized fallback reply.
pub struct ChatWidget {
    phase: WidgetPhase,
    state: SessionState,
    store: ChatSessionStore,
    backend: Arc<dyn AssistantBackend>,
    audio: Option<Arc<AudioOutput>>,
    catalog: Arc<ContentCatalog>,
    lang: Lang,
    settings: VoiceSettings,
}

impl ChatWidget {
    pub async fn mount(
        store: ChatSessionStore,
        backend: Arc<dyn AssistantBackend>,
        audio: Option<Arc<AudioOutput>>,
        catalog: Arc<ContentCatalog>,
        lang: Lang,
    ) -> Self {
        let state = store.load().await;
        Self {
            phase: WidgetPhase::Closed,
            state,
            store,
            backend,
            audio,
            catalog,
            lang,
            settings: VoiceSettings::default(),
        }
    }

    pub fn phase(&self) -> WidgetPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase != WidgetPhase::Closed
    }

    pub fn transcript(&self) -> &[Message] {
        self.state.transcript()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.state.user_name()
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut VoiceSettings {
        &mut self.settings
    }

    fn t(&self, key: &str) -> String {
        self.catalog.text(key, self.lang)
    }

    /// Open the widget.
    ///
    /// A fresh session (empty transcript, no name) gets the two welcome
    /// messages appended exactly once; re-opening never repeats them.
    pub async fn open(&mut self) {
        if self.phase != WidgetPhase::Closed {
            return;
        }
        if self.state.transcript().is_empty() && !self.state.name_confirmed() {
            self.state.append(Message::assistant(self.t("chatbot.welcome")));
            self.state.append(Message::assistant(self.t("chatbot.askName")));
            self.persist().await;
            info!("Started a fresh chat session");
        }
        self.phase = if self.state.name_confirmed() {
            WidgetPhase::Idle
        } else {
            WidgetPhase::AwaitingName
        };
    }

    /// Close the widget. The transcript is untouched; an in-flight reply
    /// still completes and persists through its own `submit` call.
    pub fn close(&mut self) {
        self.phase = WidgetPhase::Closed;
    }

    /// Submit user input.
    pub async fn submit(&mut self, input: &str) -> SubmitOutcome {
        match self.phase {
            WidgetPhase::Closed => return SubmitOutcome::Rejected(RejectReason::Closed),
            WidgetPhase::Waiting => {
                debug!("Submission refused while a reply is in flight");
                return SubmitOutcome::Rejected(RejectReason::Busy);
            }
            WidgetPhase::AwaitingName | WidgetPhase::Idle => {}
        }

        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::Empty);
        }

        if !self.state.name_confirmed() {
            self.capture_name(text).await
        } else {
            self.exchange(text).await
        }
    }

    async fn capture_name(&mut self, name: &str) -> SubmitOutcome {
        self.state.confirm_name(name);
        self.state.append(Message::user(name));
        let greeting = Message::assistant(format!(
            "{} {}! {}",
            self.t("chatbot.hello"),
            name,
            self.t("chatbot.howHelp")
        ));
        self.state.append(greeting.clone());
        self.persist().await;
        self.phase = WidgetPhase::Idle;
        info!(name, "Captured user name");
        SubmitOutcome::NameCaptured { greeting }
    }

    /// The two-step pipeline: reply, then best-effort speech. The phase
    /// returns to `Idle` only after both steps resolve or the first fails.
    async fn exchange(&mut self, text: &str) -> SubmitOutcome {
        self.state.append(Message::user(text));
        self.persist().await;
        self.phase = WidgetPhase::Waiting;

        let user_name = self.state.user_name().unwrap_or_default().to_string();
        let context = persona::build_persona_context(&self.catalog, &user_name);

        let outcome = match self.backend.generate_reply(&context, text).await {
            Ok(reply_text) => {
                let reply = Message::assistant(reply_text);
                self.state.append(reply.clone());
                self.persist().await;
                let audio_played = self.speak(&reply.text).await;
                SubmitOutcome::Replied {
                    reply,
                    audio_played,
                }
            }
            Err(e) => {
                warn!(%e, "Reply generation failed, falling back");
                let reply = Message::assistant(self.t("chatbot.error"));
                self.state.append(reply.clone());
                self.persist().await;
                SubmitOutcome::Fallback { reply }
            }
        };

        self.phase = WidgetPhase::Idle;
        outcome
    }

    /// Synthesize and play the finalized reply. Every failure here is
    /// swallowed: the text has already been delivered.
    async fn speak(&self, reply: &str) -> bool {
        let Some(audio) = &self.audio else {
            return false;
        };
        let prompt = persona::speech_prompt(reply);
        let Some(payload) = self
            .backend
            .synthesize_speech(&prompt, self.settings.voice())
            .await
        else {
            return false;
        };

        match decode_pcm16_base64(&payload) {
            Ok(buffer) if !buffer.is_empty() => match audio.play(buffer) {
                Ok(()) => true,
                Err(e) => {
                    debug!(%e, "Speech playback unavailable");
                    false
                }
            },
            Ok(_) => false,
            Err(e) => {
                debug!(%e, "Discarding undecodable speech payload");
                false
            }
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.state).await {
            warn!(%e, "Failed to persist chat session");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use fastbird_core::session::Sender;
    use fastbird_core::store::{KvStore, MemoryKvStore};
    use fastbird_gemini::ReplyError;

    use crate::markup::{parse_markup, MessageNode};

    use super::*;

    /// Backend with pre-scripted replies; records persona contexts.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, ReplyError>>>,
        speech: Option<String>,
        contexts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn replying(text: &str) -> Self {
            let backend = Self::default();
            backend
                .replies
                .lock()
                .unwrap()
                .push_back(Ok(text.to_string()));
            backend
        }

        fn failing(error: ReplyError) -> Self {
            let backend = Self::default();
            backend.replies.lock().unwrap().push_back(Err(error));
            backend
        }

        fn push_reply(&self, text: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Ok(text.to_string()));
        }
    }

    #[async_trait]
    impl AssistantBackend for ScriptedBackend {
        async fn generate_reply(
            &self,
            persona_context: &str,
            _utterance: &str,
        ) -> Result<String, ReplyError> {
            self.contexts
                .lock()
                .unwrap()
                .push(persona_context.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ReplyError::Malformed("script exhausted".into())))
        }

        async fn synthesize_speech(&self, _text: &str, _voice: VoiceId) -> Option<String> {
            self.speech.clone()
        }
    }

    async fn widget_with(backend: ScriptedBackend) -> ChatWidget {
        widget_on_kv(backend, Arc::new(MemoryKvStore::new())).await
    }

    async fn widget_on_kv(backend: ScriptedBackend, kv: Arc<dyn KvStore>) -> ChatWidget {
        ChatWidget::mount(
            ChatSessionStore::new(kv),
            Arc::new(backend),
            None,
            Arc::new(ContentCatalog::site()),
            Lang::Ar,
        )
        .await
    }

    #[tokio::test]
    async fn test_welcome_is_idempotent() {
        let mut widget = widget_with(ScriptedBackend::default()).await;
        for _ in 0..3 {
            widget.open().await;
            assert_eq!(widget.phase(), WidgetPhase::AwaitingName);
            widget.close();
        }
        assert_eq!(widget.transcript().len(), 2);
        assert!(widget
            .transcript()
            .iter()
            .all(|m| m.sender == Sender::Assistant));
    }

    #[tokio::test]
    async fn test_fresh_session_name_capture() {
        let mut widget = widget_with(ScriptedBackend::default()).await;
        widget.open().await;

        let outcome = widget.submit("Sara").await;
        let SubmitOutcome::NameCaptured { greeting } = outcome else {
            panic!("expected name capture, got {outcome:?}");
        };
        assert!(greeting.text.contains("Sara"));
        assert_eq!(widget.user_name(), Some("Sara"));
        assert_eq!(widget.phase(), WidgetPhase::Idle);

        // welcome, ask-name, user, greeting
        assert_eq!(widget.transcript().len(), 4);
        assert_eq!(widget.transcript()[2], Message::user("Sara"));
    }

    #[tokio::test]
    async fn test_whitespace_input_is_rejected() {
        let mut widget = widget_with(ScriptedBackend::default()).await;
        widget.open().await;
        let before = widget.transcript().len();

        assert_eq!(
            widget.submit("   ").await,
            SubmitOutcome::Rejected(RejectReason::Empty)
        );
        assert_eq!(widget.transcript().len(), before);
        assert_eq!(widget.phase(), WidgetPhase::AwaitingName);
    }

    #[tokio::test]
    async fn test_submit_while_closed_is_rejected() {
        let mut widget = widget_with(ScriptedBackend::default()).await;
        assert_eq!(
            widget.submit("hello").await,
            SubmitOutcome::Rejected(RejectReason::Closed)
        );
        assert!(widget.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_waiting_is_rejected() {
        let mut widget = widget_with(ScriptedBackend::default()).await;
        widget.open().await;
        widget.phase = WidgetPhase::Waiting;
        assert_eq!(
            widget.submit("hello").await,
            SubmitOutcome::Rejected(RejectReason::Busy)
        );
    }

    #[tokio::test]
    async fn test_name_captured_only_once() {
        let backend = ScriptedBackend::replying("reply one");
        let mut widget = widget_with(backend).await;
        widget.open().await;

        widget.submit("Sara").await;
        let outcome = widget.submit("what are your prices?").await;
        assert!(matches!(outcome, SubmitOutcome::Replied { .. }));
        // The second submission went to the backend, not name capture.
        assert_eq!(widget.user_name(), Some("Sara"));
    }

    #[tokio::test]
    async fn test_reply_appends_in_order() {
        let backend = ScriptedBackend::replying("الرد");
        let mut widget = widget_with(backend).await;
        widget.open().await;
        widget.submit("Sara").await;
        widget.submit("السعر كام؟").await;

        let transcript = widget.transcript();
        let n = transcript.len();
        assert_eq!(transcript[n - 2], Message::user("السعر كام؟"));
        assert_eq!(transcript[n - 1], Message::assistant("الرد"));
        assert_eq!(widget.phase(), WidgetPhase::Idle);
    }

    #[tokio::test]
    async fn test_fallback_keeps_widget_usable() {
        let backend = ScriptedBackend::failing(ReplyError::Network("boom".into()));
        backend.push_reply("recovered");
        let mut widget = widget_with(backend).await;
        widget.open().await;
        widget.submit("Sara").await;

        let outcome = widget.submit("hello?").await;
        let SubmitOutcome::Fallback { reply } = outcome else {
            panic!("expected fallback, got {outcome:?}");
        };
        let catalog = ContentCatalog::site();
        assert_eq!(reply.text, catalog.text("chatbot.error", Lang::Ar));
        assert_eq!(widget.phase(), WidgetPhase::Idle);

        // The session is still usable after the failure.
        let outcome = widget.submit("try again").await;
        assert!(matches!(outcome, SubmitOutcome::Replied { .. }));
    }

    #[tokio::test]
    async fn test_config_missing_uses_same_fallback() {
        let backend = ScriptedBackend::failing(ReplyError::ConfigMissing);
        let mut widget = widget_with(backend).await;
        widget.open().await;
        widget.submit("Sara").await;
        assert!(matches!(
            widget.submit("hi").await,
            SubmitOutcome::Fallback { .. }
        ));
    }

    #[tokio::test]
    async fn test_reply_link_token_renders() {
        let backend = ScriptedBackend::replying(
            "هيتواصل معاك مندوب. تقدر تجرب [حساب الشحن](/order-now#shipping-calculator) دلوقتي.",
        );
        let mut widget = widget_with(backend).await;
        widget.open().await;
        widget.submit("Sara").await;

        let outcome = widget.submit("price to Cairo?").await;
        let SubmitOutcome::Replied { reply, .. } = outcome else {
            panic!("expected reply, got {outcome:?}");
        };
        let nodes = parse_markup(&reply.text);
        assert!(nodes.iter().any(|node| matches!(
            node,
            MessageNode::Link { url, .. } if url == "/order-now#shipping-calculator"
        )));
    }

    #[tokio::test]
    async fn test_persona_context_contract() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let mut widget = ChatWidget::mount(
            ChatSessionStore::new(Arc::new(MemoryKvStore::new())),
            backend.clone(),
            None,
            Arc::new(ContentCatalog::site()),
            Lang::Ar,
        )
        .await;
        widget.open().await;
        widget.submit("Sara").await;
        widget.submit("hi").await;

        let contexts = backend.contexts.lock().unwrap();
        let context = contexts.last().expect("backend saw a persona context");
        assert!(context.contains("Sara"));
        assert!(context.contains("[حساب الشحن](/order-now#shipping-calculator)"));
        assert!(context.contains("[اطلب الآن](/order-now#order-form)"));
        assert!(context.contains("company.name"));
    }

    #[tokio::test]
    async fn test_persist_and_rehydrate() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());

        let mut widget = widget_on_kv(ScriptedBackend::default(), kv.clone()).await;
        widget.open().await;
        widget.submit("Sara").await;
        let before: Vec<Message> = widget.transcript().to_vec();
        drop(widget);

        // Reload-simulate: a new mount on the same session-scoped store.
        let mut reloaded = widget_on_kv(ScriptedBackend::default(), kv).await;
        assert_eq!(reloaded.transcript(), before.as_slice());
        assert_eq!(reloaded.user_name(), Some("Sara"));

        // Re-opening does not re-trigger the welcome append.
        reloaded.open().await;
        assert_eq!(reloaded.transcript(), before.as_slice());
        assert_eq!(reloaded.phase(), WidgetPhase::Idle);
    }

    #[tokio::test]
    async fn test_speech_failure_does_not_block_text() {
        // Undecodable speech payload: the reply still lands, audio is skipped.
        let backend = ScriptedBackend {
            replies: Mutex::new(VecDeque::from([Ok("نص الرد".to_string())])),
            speech: Some("!!! not base64 !!!".to_string()),
            contexts: Mutex::new(Vec::new()),
        };
        let mut widget = widget_with(backend).await;
        widget.open().await;
        widget.submit("Sara").await;

        // No audio sink is attached in tests, so playback is skipped either way.
        let outcome = widget.submit("hi").await;
        let SubmitOutcome::Replied { reply, audio_played } = outcome else {
            panic!("expected reply");
        };
        assert_eq!(reply.text, "نص الرد");
        assert!(!audio_played);
    }

    #[test]
    fn test_speech_rate_clamped() {
        let mut settings = VoiceSettings::default();
        assert_eq!(settings.speech_rate(), 1.0);
        settings.set_speech_rate(5.0);
        assert_eq!(settings.speech_rate(), 2.0);
        settings.set_speech_rate(0.1);
        assert_eq!(settings.speech_rate(), 0.5);
        settings.set_voice(VoiceId::Fenrir);
        assert_eq!(settings.voice(), VoiceId::Fenrir);
    }
}
