mod artifact;
mod controller;
mod message;

pub use artifact::{Artifact, ArtifactSink, DirectorySink};
pub use controller::{suggestion_prompt, ConversationController, SendOutcome, VoiceOutcome, QUICK_QUESTIONS};
pub use message::{Message, Role};
