use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use anyhow::Result;
use lumen_contracts::composer::{AspectRatio, ImageSize, Submission};
use lumen_contracts::conversation::{ConversationLog, Message, MessageId, MessageKind, TurnStatus};
use lumen_contracts::media::MediaItem;
use lumen_contracts::schema::build_schema;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::EngineConfig;
use crate::credentials::{CredentialProvider, CredentialState};
use crate::errors::{classify_failure, SessionError, TurnFailure};
use crate::events::{EventBus, EventPayload};
use crate::gemini::GeminiClient;
use crate::renderer::ImageRenderer;
use crate::selector::FieldSelector;
use crate::session::publish_credential_state;
use crate::synthesizer::PromptSynthesizer;

/// The three remote stages a turn runs through, in order.
#[derive(Clone)]
pub struct TurnPipeline {
    pub selector: FieldSelector,
    pub synthesizer: PromptSynthesizer,
    pub renderer: ImageRenderer,
}

impl TurnPipeline {
    pub fn new(selector: FieldSelector, synthesizer: PromptSynthesizer, renderer: ImageRenderer) -> Self {
        Self {
            selector,
            synthesizer,
            renderer,
        }
    }

    /// Wires every stage to one Gemini client.
    pub fn gemini(config: &EngineConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let client = Arc::new(GeminiClient::new(config.api_base.clone(), credentials));
        Self {
            selector: FieldSelector::new(
                client.clone(),
                config.reasoning_model.clone(),
                config.selector_temperature,
            ),
            synthesizer: PromptSynthesizer::new(
                client.clone(),
                config.reasoning_model.clone(),
                config.synthesizer_temperature,
            ),
            renderer: ImageRenderer::new(client, config.image_model.clone(), config.image_size),
        }
    }
}

/// A turn that has been appended to the log and still has to run.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    user_message_id: MessageId,
    message_id: MessageId,
    text: String,
    media: Vec<MediaItem>,
    aspect_ratio: AspectRatio,
}

impl TurnTicket {
    pub fn user_message_id(&self) -> MessageId {
        self.user_message_id
    }

    /// Id of the assistant message this turn fills in.
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Complete,
    Errored(String),
    /// The credential was rejected; the placeholder is gone.
    CredentialReset,
}

/// Shared handle to the session's conversation. Clones see the same log.
#[derive(Clone)]
pub struct Conversation {
    inner: Arc<ConversationInner>,
}

struct ConversationInner {
    log: Mutex<ConversationLog>,
    pipeline: RwLock<Arc<TurnPipeline>>,
    credential_state: Arc<watch::Sender<CredentialState>>,
    events: EventBus,
}

impl Conversation {
    pub fn new(
        pipeline: TurnPipeline,
        credential_state: Arc<watch::Sender<CredentialState>>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(ConversationInner {
                log: Mutex::new(ConversationLog::new()),
                pipeline: RwLock::new(Arc::new(pipeline)),
                credential_state,
                events,
            }),
        }
    }

    /// Appends the user message and an `AwaitingPrompt` placeholder.
    /// Empty submissions change nothing and yield `None`.
    pub fn begin_turn(&self, submission: Submission) -> Result<Option<TurnTicket>, SessionError> {
        if *self.inner.credential_state.borrow() != CredentialState::Present {
            return Err(SessionError::CredentialRequired);
        }
        if submission.is_empty() {
            return Ok(None);
        }

        let user = Message::user(&submission);
        let placeholder = Message::assistant_placeholder(submission.aspect_ratio);
        let (user_message_id, message_id) = {
            let mut log = self.log();
            (log.append(user), log.append(placeholder))
        };
        self.notify(
            "turn_started",
            message_id,
            [
                ("user_message_id", json!(user_message_id.to_string())),
                ("aspect_ratio", json!(submission.aspect_ratio.as_str())),
                ("attachments", json!(submission.media.len())),
            ],
        );

        Ok(Some(TurnTicket {
            user_message_id,
            message_id,
            text: submission.text,
            media: submission.media,
            aspect_ratio: submission.aspect_ratio,
        }))
    }

    /// Drives a turn to a terminal state. Never panics on remote failure.
    pub async fn run_turn(&self, ticket: TurnTicket) -> TurnOutcome {
        let span = info_span!("turn", id = %ticket.message_id);
        async move {
            let pipeline = self.pipeline();
            match self.execute(&pipeline, &ticket).await {
                Ok(()) => TurnOutcome::Complete,
                Err(err) => self.fail(&ticket, &err),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn submit(&self, submission: Submission) -> Result<Option<TurnOutcome>, SessionError> {
        let Some(ticket) = self.begin_turn(submission)? else {
            return Ok(None);
        };
        Ok(Some(self.run_turn(ticket).await))
    }

    async fn execute(&self, pipeline: &TurnPipeline, ticket: &TurnTicket) -> Result<()> {
        info!("selecting fields");
        let fields = pipeline
            .selector
            .select_fields(&ticket.text, &ticket.media)
            .await?;
        let schema = build_schema(&fields);

        info!(fields = fields.len(), "synthesizing payload");
        let mut payload = pipeline
            .synthesizer
            .synthesize(&ticket.text, &ticket.media, &schema)
            .await?;
        let dropped = payload.retain_fields(&fields);
        if !dropped.is_empty() {
            debug!(?dropped, "dropping unselected payload fields");
        }

        let master_prompt = payload.master_prompt.clone();
        let present: Vec<&'static str> = payload
            .present_fields()
            .into_iter()
            .map(|field| field.as_str())
            .collect();
        self.update(ticket.message_id, |message| {
            message.content = master_prompt.clone();
            message.payload = Some(payload);
            message.status = Some(TurnStatus::AwaitingImage);
        });
        self.notify(
            "turn_prompt_ready",
            ticket.message_id,
            [("fields", json!(present))],
        );

        info!(aspect_ratio = %ticket.aspect_ratio, "rendering image");
        let image = pipeline
            .renderer
            .render(&master_prompt, ticket.aspect_ratio)
            .await?;
        let mime_type = image.mime_type().to_string();
        self.update(ticket.message_id, |message| {
            message.image = Some(image);
            message.status = Some(TurnStatus::Complete);
        });
        info!("turn complete");
        self.notify(
            "turn_complete",
            ticket.message_id,
            [("mime_type", json!(mime_type))],
        );
        Ok(())
    }

    fn fail(&self, ticket: &TurnTicket, err: &anyhow::Error) -> TurnOutcome {
        match classify_failure(err) {
            TurnFailure::CredentialRejected => {
                warn!(error = %err, "credential rejected; discarding turn");
                self.log().discard(ticket.message_id);
                self.notify("turn_discarded", ticket.message_id, []);
                publish_credential_state(
                    &self.inner.credential_state,
                    &self.inner.events,
                    CredentialState::Absent,
                );
                TurnOutcome::CredentialReset
            }
            TurnFailure::Recoverable(message) => {
                warn!(error = %message, "turn failed");
                self.update(ticket.message_id, |entry| {
                    entry.kind = MessageKind::Error;
                    entry.status = Some(TurnStatus::Errored);
                    entry.content = message.clone();
                });
                self.notify(
                    "turn_failed",
                    ticket.message_id,
                    [("error", json!(message))],
                );
                TurnOutcome::Errored(message)
            }
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.log().messages().to_vec()
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.log().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }

    pub fn credential_state(&self) -> CredentialState {
        *self.inner.credential_state.borrow()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn reasoning_model(&self) -> String {
        self.pipeline().selector.model().to_string()
    }

    pub fn image_model(&self) -> String {
        self.pipeline().renderer.model().to_string()
    }

    pub fn image_size(&self) -> ImageSize {
        self.pipeline().renderer.image_size()
    }

    /// Affects turns started afterwards; running turns keep their snapshot.
    pub fn set_reasoning_model(&self, model: &str) {
        self.reconfigure(|pipeline| {
            pipeline.selector.set_model(model);
            pipeline.synthesizer.set_model(model);
        });
    }

    pub fn set_image_model(&self, model: &str) {
        self.reconfigure(|pipeline| pipeline.renderer.set_model(model));
    }

    pub fn set_image_size(&self, image_size: ImageSize) {
        self.reconfigure(|pipeline| pipeline.renderer.set_image_size(image_size));
    }

    fn reconfigure(&self, apply: impl FnOnce(&mut TurnPipeline)) {
        let mut guard = self
            .inner
            .pipeline
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = TurnPipeline::clone(&guard);
        apply(&mut next);
        *guard = Arc::new(next);
    }

    fn pipeline(&self) -> Arc<TurnPipeline> {
        self.inner
            .pipeline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn log(&self) -> MutexGuard<'_, ConversationLog> {
        self.inner.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, id: MessageId, apply: impl FnOnce(&mut Message)) {
        if !self.log().update(id, apply) {
            debug!(%id, "turn message no longer in the log");
        }
    }

    fn notify<const N: usize>(&self, event_type: &str, id: MessageId, extra: [(&str, Value); N]) {
        let mut payload = EventPayload::new();
        payload.insert("message_id".to_string(), Value::String(id.to_string()));
        for (key, value) in extra {
            payload.insert(key.to_string(), value);
        }
        self.inner.events.notify(event_type, payload);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_contracts::composer::{AspectRatio, ImageSize, Submission};
    use lumen_contracts::conversation::{MessageKind, Role, TurnStatus};
    use lumen_contracts::media::MediaItem;
    use serde_json::json;
    use tokio::sync::watch;

    use super::{Conversation, TurnOutcome, TurnPipeline};
    use crate::credentials::CredentialState;
    use crate::errors::{SessionError, NO_IMAGE_MESSAGE};
    use crate::events::EventBus;
    use crate::renderer::ImageRenderer;
    use crate::selector::FieldSelector;
    use crate::synthesizer::PromptSynthesizer;
    use crate::test_support::{ScriptedImages, ScriptedReasoning};

    fn payload_reply(master_prompt: &str) -> String {
        json!({
            "image_type": "digital illustration",
            "subjects": {"primary": "a cat in a space suit", "count": "1"},
            "lighting": {"setup": "rim light from a nearby star"},
            "typography": {"text_content": "unrequested"},
            "master_prompt": master_prompt
        })
        .to_string()
    }

    fn conversation(
        reasoning: Arc<ScriptedReasoning>,
        images: Arc<ScriptedImages>,
        state: CredentialState,
    ) -> Conversation {
        let pipeline = TurnPipeline::new(
            FieldSelector::new(reasoning.clone(), "gemini-2.5-flash", 0.2),
            PromptSynthesizer::new(reasoning, "gemini-2.5-flash", 0.9),
            ImageRenderer::new(images, "gemini-3-pro-image-preview", ImageSize::TwoK),
        );
        let (sender, _) = watch::channel(state);
        Conversation::new(pipeline, Arc::new(sender), EventBus::new("test-session"))
    }

    fn submission(text: &str) -> Submission {
        Submission::new(text, Vec::new(), AspectRatio::Square)
    }

    #[tokio::test]
    async fn cat_astronaut_turn_completes() -> anyhow::Result<()> {
        let reply = payload_reply("A cat astronaut floating above Earth, rim lit.");
        let reasoning = Arc::new(ScriptedReasoning::replying([
            "[\"subjects\", \"lighting\"]",
            reply.as_str(),
        ]));
        let images = Arc::new(ScriptedImages::png());
        let conversation = conversation(reasoning, images.clone(), CredentialState::Present);
        let mut events = conversation.events().subscribe();

        let ticket = conversation.begin_turn(submission("a cat astronaut"))?;
        let Some(ticket) = ticket else {
            panic!("expected a ticket");
        };
        let placeholder = conversation.message(ticket.message_id());
        assert_eq!(
            placeholder.and_then(|message| message.status),
            Some(TurnStatus::AwaitingPrompt)
        );

        assert_eq!(conversation.run_turn(ticket.clone()).await, TurnOutcome::Complete);

        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "a cat astronaut");
        let assistant = &messages[1];
        assert_eq!(assistant.id, ticket.message_id());
        assert_eq!(assistant.status, Some(TurnStatus::Complete));
        assert_eq!(assistant.aspect_ratio, Some(AspectRatio::Square));
        let Some(payload) = &assistant.payload else {
            panic!("expected a payload");
        };
        assert!(!payload.master_prompt.is_empty());
        assert!(payload.subjects.is_some());
        assert!(payload.typography.is_none(), "unselected fields are dropped");
        assert!(assistant
            .image
            .as_ref()
            .is_some_and(|image| image.as_str().starts_with("data:image/png;base64,")));

        let rendered = images.requests();
        assert_eq!(rendered[0].prompt, "A cat astronaut floating above Earth, rim lit.");
        assert_eq!(rendered[0].aspect_ratio, AspectRatio::Square);

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event["type"].as_str().unwrap_or_default().to_string());
        }
        assert_eq!(kinds, ["turn_started", "turn_prompt_ready", "turn_complete"]);
        Ok(())
    }

    #[tokio::test]
    async fn credential_rejection_discards_placeholder_and_resets_state() -> anyhow::Result<()> {
        // Selection succeeds, synthesis hits the rejection.
        let selecting = Arc::new(ScriptedReasoning::replying(["[\"lighting\"]"]));
        let failing = Arc::new(ScriptedReasoning::failing(
            "Gemini request failed (404): Requested entity was not found.",
        ));
        let images = Arc::new(ScriptedImages::png());
        let pipeline = TurnPipeline::new(
            FieldSelector::new(selecting, "gemini-2.5-flash", 0.2),
            PromptSynthesizer::new(failing, "gemini-2.5-flash", 0.9),
            ImageRenderer::new(images.clone(), "gemini-3-pro-image-preview", ImageSize::TwoK),
        );
        let (sender, _) = watch::channel(CredentialState::Present);
        let sender = Arc::new(sender);
        let mut state = sender.subscribe();
        let conversation = Conversation::new(pipeline, sender, EventBus::new("test-session"));

        let outcome = conversation.submit(submission("a cat astronaut")).await?;
        assert_eq!(outcome, Some(TurnOutcome::CredentialReset));
        assert!(state.has_changed()?);
        assert_eq!(*state.borrow_and_update(), CredentialState::Absent);
        assert_eq!(conversation.credential_state(), CredentialState::Absent);
        assert!(images.requests().is_empty());

        let messages = conversation.messages();
        assert_eq!(messages.len(), 1, "only the user message remains");
        assert_eq!(messages[0].role, Role::User);

        let blocked = conversation.begin_turn(submission("again"));
        assert!(matches!(blocked, Err(SessionError::CredentialRequired)));
        Ok(())
    }

    #[tokio::test]
    async fn missing_image_errors_the_turn_with_exact_message() -> anyhow::Result<()> {
        let reply = payload_reply("A lighthouse at dusk.");
        let reasoning = Arc::new(ScriptedReasoning::replying(["[]", reply.as_str()]));
        let images = Arc::new(ScriptedImages::replying(Vec::new()));
        let conversation = conversation(reasoning, images, CredentialState::Present);

        let outcome = conversation.submit(submission("a lighthouse")).await?;
        assert_eq!(outcome, Some(TurnOutcome::Errored(NO_IMAGE_MESSAGE.to_string())));

        let messages = conversation.messages();
        let assistant = &messages[1];
        assert_eq!(assistant.status, Some(TurnStatus::Errored));
        assert_eq!(assistant.kind, MessageKind::Error);
        assert_eq!(assistant.content, NO_IMAGE_MESSAGE);
        assert_eq!(conversation.credential_state(), CredentialState::Present);
        Ok(())
    }

    #[tokio::test]
    async fn selection_failure_errors_the_turn() -> anyhow::Result<()> {
        let reasoning = Arc::new(ScriptedReasoning::failing("quota exhausted"));
        let conversation = conversation(reasoning, Arc::new(ScriptedImages::png()), CredentialState::Present);

        let outcome = conversation.submit(submission("anything")).await?;
        assert_eq!(outcome, Some(TurnOutcome::Errored("quota exhausted".to_string())));
        assert_eq!(conversation.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_submission_changes_nothing() -> anyhow::Result<()> {
        let reasoning = Arc::new(ScriptedReasoning::replying([]));
        let conversation = conversation(reasoning.clone(), Arc::new(ScriptedImages::png()), CredentialState::Present);

        assert!(conversation.begin_turn(submission("   \n"))?.is_none());
        assert_eq!(conversation.submit(submission("")).await?, None);
        assert!(conversation.is_empty());
        assert!(reasoning.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn media_only_submission_starts_a_turn() -> anyhow::Result<()> {
        let reasoning = Arc::new(ScriptedReasoning::replying([]));
        let conversation = conversation(reasoning, Arc::new(ScriptedImages::png()), CredentialState::Present);
        let media = vec![MediaItem::from_bytes(b"ref", "image/png")];
        let ticket = conversation.begin_turn(Submission::new("", media, AspectRatio::Portrait3x4))?;
        assert!(ticket.is_some());
        assert_eq!(conversation.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn submissions_require_a_present_credential() {
        for state in [CredentialState::Unknown, CredentialState::Absent] {
            let reasoning = Arc::new(ScriptedReasoning::replying([]));
            let conversation = conversation(reasoning, Arc::new(ScriptedImages::png()), state);
            let result = conversation.begin_turn(submission("a cat astronaut"));
            assert!(matches!(result, Err(SessionError::CredentialRequired)));
            assert!(conversation.is_empty());
        }
    }

    #[tokio::test]
    async fn concurrent_turns_stay_independent() -> anyhow::Result<()> {
        let first_reply = payload_reply("First image.");
        let second_reply = payload_reply("Second image.");
        // Both selections run before either synthesis: the service yields between calls.
        let reasoning = Arc::new(ScriptedReasoning::replying([
            "[\"lighting\"]",
            "[\"subjects\"]",
            first_reply.as_str(),
            second_reply.as_str(),
        ]));
        let conversation = conversation(reasoning, Arc::new(ScriptedImages::png()), CredentialState::Present);

        let first = conversation.begin_turn(submission("first"))?;
        let second = conversation.begin_turn(submission("second"))?;
        let (Some(first), Some(second)) = (first, second) else {
            panic!("expected two tickets");
        };
        let (first_outcome, second_outcome) = tokio::join!(
            conversation.run_turn(first.clone()),
            conversation.run_turn(second.clone())
        );
        assert_eq!(first_outcome, TurnOutcome::Complete);
        assert_eq!(second_outcome, TurnOutcome::Complete);

        assert_eq!(conversation.len(), 4);
        let first_message = conversation.message(first.message_id());
        let second_message = conversation.message(second.message_id());
        let (Some(first_message), Some(second_message)) = (first_message, second_message) else {
            panic!("expected both assistant messages");
        };
        assert_ne!(first_message.id, second_message.id);
        assert_eq!(first_message.status, Some(TurnStatus::Complete));
        assert_eq!(second_message.status, Some(TurnStatus::Complete));
        assert_ne!(first_message.content, second_message.content);
        let order: Vec<_> = conversation.messages().iter().map(|message| message.id).collect();
        assert_eq!(
            order,
            vec![
                first.user_message_id(),
                first.message_id(),
                second.user_message_id(),
                second.message_id()
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn model_changes_apply_to_later_turns() -> anyhow::Result<()> {
        let reply = payload_reply("A fox.");
        let reasoning = Arc::new(ScriptedReasoning::replying(["[]", reply.as_str()]));
        let images = Arc::new(ScriptedImages::png());
        let conversation = conversation(reasoning.clone(), images.clone(), CredentialState::Present);

        conversation.set_reasoning_model("gemini-2.5-pro");
        conversation.set_image_model("gemini-2.5-flash-image");
        conversation.set_image_size(ImageSize::FourK);
        assert_eq!(conversation.reasoning_model(), "gemini-2.5-pro");
        assert_eq!(conversation.image_model(), "gemini-2.5-flash-image");

        conversation.submit(submission("a fox")).await?;
        assert!(reasoning
            .requests()
            .iter()
            .all(|request| request.model == "gemini-2.5-pro"));
        assert_eq!(images.requests()[0].model, "gemini-2.5-flash-image");
        assert_eq!(images.requests()[0].image_size, ImageSize::FourK);
        Ok(())
    }
}
