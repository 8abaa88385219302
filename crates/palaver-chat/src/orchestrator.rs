use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use jiff::Timestamp;
use palaver_config::ModelsConfig;
use palaver_core::{Identity, MessagePart, Role, joined_text};
use palaver_history::{ChatRecord, HistoryError, HistoryStore, MessageRecord};
use palaver_llm::{ChainSource, GenerationRequest, StreamEvent};
use palaver_moderation::{ModerationGate, Verdict};
use palaver_quota::{CreditLedger, PricingState, effective_cost};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::attach::AttachmentInliner;
use crate::error::ChatError;
use crate::event::{ChatEvent, ChatStream};
use crate::request::{ChatRequest, IncomingMessage};
use crate::resolve::{Resolution, ResolvedModel, resolve_model};
use crate::resume::ResumableStreamRegistry;
use crate::title::TitleGenerator;

/// Collaborators the orchestrator is constructed from
///
/// Everything is injected explicitly; the orchestrator holds no hidden
/// process-wide state.
pub struct OrchestratorParts {
    /// Fallback chain source
    pub chains: Arc<dyn ChainSource>,
    /// Model catalog and selection defaults
    pub models: ModelsConfig,
    /// Moderation gate, applied to inbound and outbound text
    pub gate: ModerationGate,
    /// Credit ledger
    pub ledger: CreditLedger,
    /// Active pricing multiplier source
    pub pricing: Arc<dyn PricingState>,
    /// Chat history store
    pub history: Arc<dyn HistoryStore>,
    /// Attachment inliner
    pub inliner: AttachmentInliner,
    /// Title generator for new conversations
    pub title: TitleGenerator,
    /// Resumable stream registry, if a backing store is configured
    pub resume: Option<ResumableStreamRegistry>,
}

/// Drives one chat turn end to end
///
/// The per-request flow is a strictly ordered sequence: conversation
/// load/create, inbound moderation, model resolution, credit debit,
/// generation against the fallback chain, outbound moderation, then
/// persistence. Each inbound request runs on one logical task and is
/// the single producer of its outbound event stream.
#[derive(Clone)]
pub struct StreamOrchestrator {
    inner: Arc<OrchestratorParts>,
}

impl StreamOrchestrator {
    /// Assemble the orchestrator from its collaborators
    #[must_use]
    pub fn new(parts: OrchestratorParts) -> Self {
        Self { inner: Arc::new(parts) }
    }

    /// Run one chat turn, returning the outbound event stream
    ///
    /// Errors returned here happen before any token is streamed;
    /// failures after that point surface as a terminal `error` event
    /// on the stream instead.
    ///
    /// # Errors
    ///
    /// See [`ChatError`] for the taxonomy and propagation policy.
    pub async fn run(&self, identity: &Identity, request: ChatRequest) -> Result<ChatStream, ChatError> {
        request.validate()?;

        if !self.inner.chains.has_credentials() {
            return Err(ChatError::ServiceUnavailable("no provider credentials configured".to_owned()));
        }

        let tool_approval = request.is_tool_approval();

        // The conversation row is created before moderation runs, so a
        // blocked first turn leaves an empty conversation behind (see
        // DESIGN.md)
        let existing = self.inner.history.get_chat(request.id).await?;
        if let Some(ref chat) = existing
            && chat.user_id != identity.key()
        {
            return Err(ChatError::Forbidden("conversation belongs to another user".to_owned()));
        }

        let new_user_turn = request.message.as_ref().is_some_and(|m| m.role == Role::User);
        let is_new_chat = existing.is_none() && new_user_turn;

        if is_new_chat {
            self.inner
                .history
                .create_chat(ChatRecord {
                    id: request.id,
                    user_id: identity.key().to_owned(),
                    title: "New chat".to_owned(),
                    visibility: request.visibility,
                    created_at: Timestamp::now(),
                })
                .await?;
        }

        // Assemble the working message list; tool-approval turns skip
        // the history read and use the supplied list as-is
        let working = if tool_approval {
            request.messages.clone().unwrap_or_default()
        } else {
            let mut list: Vec<IncomingMessage> = self
                .inner
                .history
                .list_messages(request.id)
                .await?
                .iter()
                .map(IncomingMessage::from_record)
                .collect();
            if let Some(ref message) = request.message {
                list.push(message.clone());
            }
            list
        };

        // Attachment bytes are fetched before generation, never
        // interleaved with streaming
        let working = self.inner.inliner.inline(working).await;

        let user_text = request
            .message
            .as_ref()
            .map(|message| joined_text(&message.parts))
            .unwrap_or_default();

        // Inbound moderation gates before any quota debit
        let mut user_flagged = false;
        if new_user_turn {
            match self.inner.gate.classify(&user_text).await? {
                Verdict::Block => {
                    tracing::warn!(chat = %request.id, "moderation blocked user message");
                    return Err(ChatError::ContentBlocked);
                }
                verdict => user_flagged = verdict.flags_message(),
            }
        }

        let has_images = working
            .iter()
            .any(|message| message.parts.iter().any(MessagePart::is_image));

        let resolved = match resolve_model(&self.inner.models, &request.selected_model_id, &user_text, has_images)? {
            Resolution::Model(model) => model,
            Resolution::NoVisionAvailable => {
                // Informational short-circuit: no generation, no charge
                let notice = format!(
                    "No vision-capable model is available to process attached images (selected model: \"{}\").",
                    request.selected_model_id
                );
                return Ok(Box::pin(futures_util::stream::iter([
                    ChatEvent::TextDelta {
                        delta: notice,
                        transient: true,
                    },
                    ChatEvent::Finish,
                ])));
            }
        };

        // Optimistic charge: debited before generation and not refunded
        // if generation later fails
        if !tool_approval && new_user_turn {
            let multiplier = self.inner.pricing.active_multiplier().await;
            let cost = effective_cost(resolved.credit_cost, multiplier);
            let outcome = self.inner.ledger.try_debit(identity, cost).await?;

            if !outcome.allowed {
                return Err(ChatError::RateLimited {
                    remaining: outcome.remaining,
                    required: cost,
                    borrow_available: outcome.borrow_available,
                });
            }

            tracing::info!(
                user = identity.key(),
                model = %resolved.id,
                credits = cost,
                remaining = outcome.remaining,
                "charged model usage"
            );

            if let Some(ref message) = request.message {
                self.inner
                    .history
                    .save_messages(vec![message.to_record(request.id, user_flagged, Timestamp::now())])
                    .await?;
            }
        }

        // Title generation is detached; its failure never blocks or
        // fails the main response
        let title_task = is_new_chat.then(|| {
            let generator = self.inner.title.clone();
            let text = user_text.clone();
            tokio::spawn(async move { generator.generate(&text).await })
        });

        let generation = GenerationTask {
            inner: Arc::clone(&self.inner),
            chat_id: request.id,
            resolved,
            working,
            tool_approval,
            title_task,
        };

        generation.start().await
    }
}

/// One spawned generation run feeding the outbound event channel
struct GenerationTask {
    inner: Arc<OrchestratorParts>,
    chat_id: Uuid,
    resolved: ResolvedModel,
    working: Vec<IncomingMessage>,
    tool_approval: bool,
    title_task: Option<JoinHandle<Option<String>>>,
}

impl GenerationTask {
    /// Register resumability, spawn the driver, return the stream
    async fn start(self) -> Result<ChatStream, ChatError> {
        let (tx, rx) = futures::channel::mpsc::channel::<ChatEvent>(64);

        let stream_id = Uuid::new_v4();
        let resume = match self.inner.resume {
            Some(ref registry) => {
                // The mapping must be durable before the stream is
                // exposed to the client
                match registry.register(stream_id, self.chat_id).await {
                    Ok(()) => Some(registry.clone()),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to register resumable stream");
                        None
                    }
                }
            }
            None => None,
        };

        let emitter = EventEmitter { tx, resume, stream_id };
        tokio::spawn(self.drive(emitter));

        Ok(Box::pin(rx))
    }

    fn request(&self) -> GenerationRequest {
        GenerationRequest {
            model: self.resolved.id.clone(),
            system: Some(system_directive(self.resolved.supports_tools)),
            messages: self.working.iter().map(IncomingMessage::to_turn).collect(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn drive(mut self, mut emitter: EventEmitter) {
        let request = self.request();

        if emitter
            .send(ChatEvent::TextDelta {
                delta: format!("Using model {}", self.resolved.id),
                transient: true,
            })
            .await
            .is_err()
        {
            return;
        }

        // Drain the fallback chain in priority order; only failures
        // with a retryable kind move on to the next credential
        let chain = self.inner.chains.chain(&self.resolved.id);
        let mut stream = None;

        for (attempt, handle) in chain.iter().enumerate() {
            match handle.generate_stream(&request).await {
                Ok(opened) => {
                    if attempt > 0 {
                        tracing::info!(handle = handle.label(), attempt, "fallback credential succeeded");
                    }
                    stream = Some(opened);
                    break;
                }
                Err(e) => {
                    let more_handles = attempt + 1 < chain.len();
                    tracing::warn!(
                        handle = handle.label(),
                        error = %e,
                        retryable = e.is_retryable(),
                        "generation attempt failed"
                    );

                    if !(e.is_retryable() && more_handles) {
                        let _ = emitter
                            .send(ChatEvent::Error {
                                code: "generation_failed".to_owned(),
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        }

        let Some(mut stream) = stream else {
            let _ = emitter
                .send(ChatEvent::Error {
                    code: "service_unavailable".to_owned(),
                    message: "no provider credentials configured".to_owned(),
                })
                .await;
            return;
        };

        // Deltas are forwarded as they arrive, never buffered until
        // completion
        let mut full_text = String::new();
        let mut disconnected = false;
        let mut failed = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamEvent::Delta(text)) => {
                    full_text.push_str(&text);
                    if emitter
                        .send(ChatEvent::TextDelta {
                            delta: text,
                            transient: false,
                        })
                        .await
                        .is_err()
                    {
                        disconnected = true;
                        break;
                    }
                }
                // Separated reasoning stays internal
                Ok(StreamEvent::Thinking(_)) => {}
                Ok(StreamEvent::Done) => break,
                Err(e) => {
                    tracing::error!(error = %e, "stream failed mid-generation");
                    let _ = emitter
                        .send(ChatEvent::Error {
                            code: "generation_failed".to_owned(),
                            message: e.to_string(),
                        })
                        .await;
                    failed = true;
                    break;
                }
            }
        }

        if disconnected {
            // Client is gone: stop consuming upstream promptly and keep
            // whatever was generated (documented choice, see DESIGN.md)
            tracing::debug!(chat = %self.chat_id, "client disconnected; persisting partial response");
            self.persist(&full_text, false).await;
            return;
        }

        if failed {
            // The streamed text stays attributable even though the
            // caller was told generation failed
            self.persist(&full_text, false).await;
            return;
        }

        // Outbound moderation never retracts already-streamed tokens;
        // a block verdict annotates and appends a visible notice
        let mut flagged = false;
        match self.inner.gate.classify(&full_text).await {
            Ok(Verdict::Block) => {
                tracing::warn!(chat = %self.chat_id, "moderation blocked generated response");
                flagged = true;
                let _ = emitter
                    .send(ChatEvent::TextDelta {
                        delta: "This response was flagged by moderation and is hidden from the conversation."
                            .to_owned(),
                        transient: true,
                    })
                    .await;
            }
            Ok(Verdict::Review) => flagged = true,
            Ok(Verdict::Allow) => {}
            Err(e) => {
                tracing::error!(error = %e, "output moderation unavailable");
                flagged = true;
                let _ = emitter
                    .send(ChatEvent::Error {
                        code: "moderation_unavailable".to_owned(),
                        message: e.to_string(),
                    })
                    .await;
            }
        }

        if let Some(record) = self.persist(&full_text, flagged).await {
            let _ = emitter
                .send(ChatEvent::MessageMetadata {
                    message_id: record.id,
                    moderation: record.moderation,
                    created_at: record.created_at,
                })
                .await;
        }

        // Attach the title opportunistically once the detached task
        // resolves; the content has already streamed by now
        if let Some(handle) = self.title_task.take() {
            match handle.await {
                Ok(Some(title)) => {
                    if let Err(e) = self.inner.history.update_title(self.chat_id, &title).await {
                        tracing::warn!(error = %e, "failed to persist chat title");
                    }
                    let _ = emitter.send(ChatEvent::ChatTitle { title }).await;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "title task failed"),
            }
        }

        if !self.resolved.supports_tools {
            let _ = emitter
                .send(ChatEvent::TextDelta {
                    delta: format!(
                        "Model \"{}\" does not support tools; the response was generated without them.",
                        self.resolved.id
                    ),
                    transient: true,
                })
                .await;
        }

        let _ = emitter.send(ChatEvent::Finish).await;
    }

    /// Persist the assistant turn
    ///
    /// Tool-approval flows diff against the supplied list first:
    /// pre-existing message ids are updated in place, new ids inserted.
    async fn persist(&self, full_text: &str, flagged: bool) -> Option<MessageRecord> {
        if self.tool_approval {
            for message in &self.working {
                match self.inner.history.update_message(message.id, message.parts.clone()).await {
                    Ok(()) => {}
                    Err(HistoryError::NotFound) => {
                        let record = message.to_record(self.chat_id, false, Timestamp::now());
                        if let Err(e) = self.inner.history.save_messages(vec![record]).await {
                            tracing::warn!(message = %message.id, error = %e, "failed to insert approved message");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(message = %message.id, error = %e, "failed to update approved message");
                    }
                }
            }
        }

        if full_text.is_empty() {
            return None;
        }

        let record = MessageRecord {
            id: Uuid::new_v4(),
            chat_id: self.chat_id,
            role: Role::Assistant,
            parts: vec![MessagePart::Text {
                text: full_text.to_owned(),
            }],
            created_at: Timestamp::now(),
            moderation: flagged,
        };

        match self.inner.history.save_messages(vec![record.clone()]).await {
            Ok(()) => Some(record),
            Err(e) => {
                tracing::error!(error = %e, "failed to persist assistant message");
                None
            }
        }
    }
}

/// Single writer for the outbound event channel
///
/// Every event is also recorded to the resumable stream registry, best
/// effort, before it is offered to the client.
struct EventEmitter {
    tx: futures::channel::mpsc::Sender<ChatEvent>,
    resume: Option<ResumableStreamRegistry>,
    stream_id: Uuid,
}

impl EventEmitter {
    /// Send one event; `Err` means the client is gone
    async fn send(&mut self, event: ChatEvent) -> Result<(), ()> {
        if let Some(ref registry) = self.resume {
            registry.append(self.stream_id, &event).await;
        }
        self.tx.send(event).await.map_err(|_| ())
    }
}

/// System text for the generation request
///
/// Tool availability is always stated explicitly rather than silently
/// omitting the capability.
fn system_directive(supports_tools: bool) -> String {
    let mut directive = String::from(
        "You are a helpful assistant. Answer accurately and concisely, \
         matching the level of detail the user asks for.",
    );

    if supports_tools {
        directive.push_str("\n\nYou may call the available tools when they help answer the request.");
    } else {
        directive.push_str("\n\nTools are disabled for this model; respond directly without tool calls.");
    }

    directive
}
