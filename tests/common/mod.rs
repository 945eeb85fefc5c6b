// Test doubles shared by the integration tests

#![allow(dead_code)]

use intelliml_chat::audio::{CaptureConstraints, CaptureDevice, CaptureError, CaptureStream, RecorderEvent};
use intelliml_chat::client::{
    AssistantService, ChatReply, ServiceError, SuggestionsResponse, TranscriptionResponse,
};
use intelliml_chat::recording::ClipUpload;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// How a scripted capture stream behaves once armed
#[derive(Debug, Clone)]
pub enum Plan {
    /// Refuse access
    Deny,
    /// Deliver these chunks, then stop when asked
    Chunks(Vec<Vec<u8>>),
    /// Fail right after arming
    RecorderError(String),
    /// Never acknowledge a stop request
    Hang(Vec<Vec<u8>>),
    /// Never resolve the access request
    Stall,
}

/// Capture device that counts acquisitions and releases
pub struct ScriptedDevice {
    plan: Mutex<Plan>,
    pub acquired: AtomicUsize,
    pub released: Arc<AtomicUsize>,
}

impl ScriptedDevice {
    pub fn new(plan: Plan) -> Arc<Self> {
        Arc::new(Self {
            plan: Mutex::new(plan),
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn set_plan(&self, plan: Plan) {
        *self.plan.lock().unwrap() = plan;
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn acquire(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let plan = self.plan.lock().unwrap().clone();
        match plan {
            Plan::Deny => return Err(CaptureError::PermissionDenied),
            Plan::Stall => std::future::pending::<()>().await,
            _ => {}
        }
        Ok(Box::new(ScriptedStream {
            plan,
            events: None,
            released: self.released.clone(),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedStream {
    plan: Plan,
    events: Option<mpsc::UnboundedSender<RecorderEvent>>,
    released: Arc<AtomicUsize>,
}

impl CaptureStream for ScriptedStream {
    fn mime_type(&self) -> &str {
        "audio/webm;codecs=opus"
    }

    fn start_recorder(
        &mut self,
        _timeslice: Duration,
    ) -> Result<mpsc::UnboundedReceiver<RecorderEvent>, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        match &self.plan {
            Plan::Chunks(chunks) | Plan::Hang(chunks) => {
                for chunk in chunks {
                    let _ = tx.send(RecorderEvent::Data(chunk.clone()));
                }
            }
            Plan::RecorderError(reason) => {
                let _ = tx.send(RecorderEvent::Error(reason.clone()));
            }
            Plan::Deny | Plan::Stall => {}
        }
        self.events = Some(tx);
        Ok(rx)
    }

    fn stop_recorder(&mut self) {
        if let Plan::Hang(_) = self.plan {
            return;
        }
        if let Some(tx) = self.events.take() {
            let _ = tx.send(RecorderEvent::Stopped);
        }
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Assistant service double with call counters and optional chat and transcription gates
pub struct FakeService {
    pub reply: Mutex<Result<ChatReply, ServiceError>>,
    pub transcript: Mutex<Result<TranscriptionResponse, ServiceError>>,
    pub suggestions: Mutex<Result<SuggestionsResponse, ServiceError>>,
    pub clear_result: Mutex<Result<(), ServiceError>>,
    pub gate: Option<Arc<Notify>>,
    pub transcribe_gate: Option<Arc<Notify>>,
    pub chat_calls: AtomicUsize,
    pub transcribe_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub last_upload: Mutex<Option<ClipUpload>>,
    pub sent: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            reply: Mutex::new(Ok(reply("Here is the summary"))),
            transcript: Mutex::new(Ok(TranscriptionResponse {
                text: "Show data summary".to_string(),
                success: true,
            })),
            suggestions: Mutex::new(Ok(SuggestionsResponse::default())),
            clear_result: Mutex::new(Ok(())),
            gate: None,
            transcribe_gate: None,
            chat_calls: AtomicUsize::new(0),
            transcribe_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            last_upload: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Chat calls wait for `gate.notify_one()`
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let service = Self {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (service, gate)
    }

    /// Transcriptions wait for `gate.notify_one()`
    pub fn transcribe_gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let service = Self {
            transcribe_gate: Some(gate.clone()),
            ..Self::new()
        };
        (service, gate)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

pub fn reply(text: &str) -> ChatReply {
    ChatReply {
        text: text.to_string(),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl AssistantService for FakeService {
    async fn transcribe(&self, upload: ClipUpload) -> Result<TranscriptionResponse, ServiceError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_upload.lock().unwrap() = Some(upload);
        if let Some(gate) = &self.transcribe_gate {
            gate.notified().await;
        }
        self.transcript.lock().unwrap().clone()
    }

    async fn send_message(&self, text: &str) -> Result<ChatReply, ServiceError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.lock().unwrap().clone()
    }

    async fn suggestions(&self) -> Result<SuggestionsResponse, ServiceError> {
        self.suggestions.lock().unwrap().clone()
    }

    async fn clear_history(&self) -> Result<(), ServiceError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.clear_result.lock().unwrap().clone()
    }
}
