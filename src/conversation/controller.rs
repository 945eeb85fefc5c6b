use anyhow::{anyhow, Result};
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::artifact::{Artifact, ArtifactSink};
use super::message::Message;
use crate::client::{AssistantService, ServiceError, Suggestion};
use crate::recording::{RecordingError, RecordingSession, RecordingState};

/// Preset prompts offered before the first message
pub const QUICK_QUESTIONS: &[&str] = &[
    "Show data summary",
    "Which columns have missing values?",
    "What is the average of numeric columns?",
    "Create a correlation heatmap",
];

/// Prompt sent when a suggestion is picked
pub fn suggestion_prompt(suggestion: &Suggestion) -> String {
    format!("Create a {} chart: {}", suggestion.kind, suggestion.description)
}

/// What happened to a `send` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Turn completed with a regular assistant reply
    Replied,
    /// Turn completed with an error-flagged assistant message
    Failed,
    /// Another turn is outstanding; the text was kept as the draft
    Busy(String),
    /// Nothing to send
    Empty,
}

/// What happened to a voice request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// Capture is live
    Started,
    /// Request did not apply in the current state
    Ignored,
    /// Capture or transcription failed; the reason is also the voice notice
    Failed(RecordingError),
    /// The transcript was sent as a chat turn
    Sent(SendOutcome),
}

/// Conversation state and turn orchestration
///
/// All methods take `&self` so concurrent UI events can be driven on one
/// task. At most one chat call and one transcription are in flight. The
/// flags guarding them are reset on drop, and a voice transition dropped
/// midway returns the session to a startable state, so an abandoned future
/// never wedges the controller.
pub struct ConversationController {
    service: Arc<dyn AssistantService>,
    request_timeout: Duration,
    messages: Mutex<Vec<Message>>,
    session: Mutex<RecordingSession>,
    chat_in_flight: AtomicBool,
    transcribing: AtomicBool,
    voice_notice: Mutex<Option<String>>,
    draft: Mutex<Option<String>>,
}

impl ConversationController {
    pub fn new(
        service: Arc<dyn AssistantService>,
        session: RecordingSession,
        request_timeout: Duration,
    ) -> Self {
        Self {
            service,
            request_timeout,
            messages: Mutex::new(Vec::new()),
            session: Mutex::new(session),
            chat_in_flight: AtomicBool::new(false),
            transcribing: AtomicBool::new(false),
            voice_notice: Mutex::new(None),
            draft: Mutex::new(None),
        }
    }

    /// Snapshot of the message log
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.lock().await.len()
    }

    /// True while a chat call or a transcription is outstanding
    pub fn is_busy(&self) -> bool {
        self.chat_in_flight.load(Ordering::SeqCst) || self.transcribing.load(Ordering::SeqCst)
    }

    pub fn is_transcribing(&self) -> bool {
        self.transcribing.load(Ordering::SeqCst)
    }

    /// Current recording state, `Preparing` while a transition holds the session
    pub fn recording_state(&self) -> RecordingState {
        match self.session.try_lock() {
            Ok(session) => session.state().clone(),
            Err(_) => RecordingState::Preparing,
        }
    }

    pub async fn voice_notice(&self) -> Option<String> {
        self.voice_notice.lock().await.clone()
    }

    /// Take the text a busy `send` left behind
    pub async fn take_draft(&self) -> Option<String> {
        self.draft.lock().await.take()
    }

    /// Send one user turn
    ///
    /// The user message is appended before the chat call is issued and the
    /// assistant message after it resolves. Remote failures never escape:
    /// they are appended as error-flagged assistant messages.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }

        if self.transcribing.load(Ordering::SeqCst) {
            return self.keep_draft(text).await;
        }
        let Some(_turn) = InFlight::try_begin(&self.chat_in_flight) else {
            return self.keep_draft(text).await;
        };

        self.messages.lock().await.push(Message::user(text));
        info!("Sending chat message ({} chars)", text.len());

        let (message, outcome) = match self.bounded(self.service.send_message(text)).await {
            Ok(reply) => {
                let message = Message::assistant(reply);
                if message.error {
                    warn!("Assistant reported an error: {}", message.content);
                    (message, SendOutcome::Failed)
                } else {
                    (message, SendOutcome::Replied)
                }
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                (Message::failure(&e), SendOutcome::Failed)
            }
        };

        self.messages.lock().await.push(message);
        outcome
    }

    /// Begin voice capture
    pub async fn start_voice(&self) -> VoiceOutcome {
        if self.is_busy() {
            debug!("Voice start ignored while a turn is outstanding");
            return VoiceOutcome::Ignored;
        }
        // Declared before the session guard so it runs after the lock is released
        let mut transition = VoiceTransition::new(&self.session);

        // Held by another voice transition
        let Ok(mut session) = self.session.try_lock() else {
            return VoiceOutcome::Ignored;
        };
        if !session.state().can_start() {
            return VoiceOutcome::Ignored;
        }

        self.set_notice(None).await;
        session.clear_error();

        transition.arm();
        let started = session.start().await;
        transition.disarm();

        match started {
            Ok(()) => VoiceOutcome::Started,
            Err(e) => {
                self.set_notice(Some(e.to_string())).await;
                VoiceOutcome::Failed(e)
            }
        }
    }

    /// Finish voice capture, transcribe the clip and send the transcript
    pub async fn stop_voice(&self) -> VoiceOutcome {
        let clip = {
            let Ok(mut session) = self.session.try_lock() else {
                return VoiceOutcome::Ignored;
            };
            if *session.state() != RecordingState::Recording {
                return VoiceOutcome::Ignored;
            }
            self.set_notice(None).await;

            match session.stop().await {
                Ok(Some(clip)) => clip,
                Ok(None) => return VoiceOutcome::Ignored,
                Err(e) => {
                    self.set_notice(Some(e.to_string())).await;
                    return VoiceOutcome::Failed(e);
                }
            }
        };

        let mut transition = VoiceTransition::new(&self.session);
        transition.arm();

        let transcript = {
            let _transcribing = InFlight::begin(&self.transcribing);
            info!("Transcribing {} byte clip", clip.len());
            self.transcribe(clip).await
        };

        let handoff = transcript.as_ref().map(|_| ()).map_err(Clone::clone);
        self.session.lock().await.finish_transcription(handoff);
        transition.disarm();

        match transcript {
            Ok(text) => {
                info!("Transcript ready ({} chars)", text.len());
                VoiceOutcome::Sent(self.send(&text).await)
            }
            Err(e) => {
                self.set_notice(Some(e.to_string())).await;
                VoiceOutcome::Failed(e)
            }
        }
    }

    /// Stop when recording, start otherwise
    pub async fn toggle_voice(&self) -> VoiceOutcome {
        if self.recording_state() == RecordingState::Recording {
            self.stop_voice().await
        } else {
            self.start_voice().await
        }
    }

    /// Collect recorder data already queued; surfaces recorder errors early
    pub async fn pump_voice(&self) -> Option<RecordingError> {
        let Ok(mut session) = self.session.try_lock() else {
            return None;
        };
        match session.pump() {
            Ok(_) => None,
            Err(e) => {
                self.set_notice(Some(e.to_string())).await;
                Some(e)
            }
        }
    }

    /// Drop an in-progress capture without transcribing
    pub async fn cancel_voice(&self) {
        self.session.lock().await.abort();
    }

    /// Empty the log; the service is notified on a best-effort basis
    pub async fn clear(&self) {
        if let Err(e) = self.bounded(self.service.clear_history()).await {
            warn!("Failed to clear remote history: {}", e);
        }
        let mut messages = self.messages.lock().await;
        info!("Clearing {} messages", messages.len());
        messages.clear();
    }

    /// Visualization ideas, empty when the service cannot provide them
    pub async fn suggestions(&self) -> Vec<Suggestion> {
        match self.bounded(self.service.suggestions()).await {
            Ok(response) => response.suggestions,
            Err(e) => {
                warn!("Failed to load suggestions: {}", e);
                Vec::new()
            }
        }
    }

    /// Hand the visualization of message `index` to `sink`
    ///
    /// Returns the suggested file name the sink received.
    pub async fn export_visualization(&self, index: usize, sink: &dyn ArtifactSink) -> Result<String> {
        let uri = {
            let messages = self.messages.lock().await;
            let message = messages
                .get(index)
                .ok_or_else(|| anyhow!("no message at index {}", index))?;
            message
                .visualization
                .clone()
                .ok_or_else(|| anyhow!("message {} has no visualization", index))?
        };

        let artifact = Artifact::from_data_uri(&uri)?;
        let name = artifact.suggested_name("visualization", Utc::now());
        sink.emit(&artifact.bytes, &name)?;

        Ok(name)
    }

    async fn transcribe(&self, clip: crate::recording::AudioClip) -> Result<String, RecordingError> {
        let upload = clip
            .into_upload()
            .map_err(|e| RecordingError::Transcription(format!("{:#}", e)))?;

        match self.bounded(self.service.transcribe(upload)).await {
            Ok(response) if response.success && !response.text.trim().is_empty() => {
                Ok(response.text.trim().to_string())
            }
            Ok(_) => Err(RecordingError::Transcription(
                "no speech was recognised".to_string(),
            )),
            Err(e) => Err(RecordingError::Transcription(e.to_string())),
        }
    }

    async fn keep_draft(&self, text: &str) -> SendOutcome {
        debug!("Turn outstanding, keeping input as draft");
        *self.draft.lock().await = Some(text.to_string());
        SendOutcome::Busy(text.to_string())
    }

    async fn set_notice(&self, notice: Option<String>) {
        *self.voice_notice.lock().await = notice;
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.request_timeout.as_secs())),
        }
    }
}

/// Set while alive, cleared on drop
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn try_begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }

    fn begin(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Settles the recording session if a voice transition is dropped while armed
///
/// A grant left in `Preparing` is aborted back to `Idle`; a clip left in
/// `Transcribing` is finished as a failed transcription.
struct VoiceTransition<'a> {
    session: &'a Mutex<RecordingSession>,
    armed: bool,
}

impl<'a> VoiceTransition<'a> {
    fn new(session: &'a Mutex<RecordingSession>) -> Self {
        Self {
            session,
            armed: false,
        }
    }

    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for VoiceTransition<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(mut session) = self.session.try_lock() else {
            warn!("Voice transition abandoned while the session was locked");
            return;
        };
        match session.state() {
            RecordingState::Preparing => {
                warn!("Voice start abandoned during capture grant");
                session.abort();
            }
            RecordingState::Transcribing => {
                warn!("Voice stop abandoned during transcription");
                session.finish_transcription(Err(RecordingError::Transcription(
                    "transcription was abandoned".to_string(),
                )));
            }
            _ => {}
        }
    }
}
