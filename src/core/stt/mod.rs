mod base;
pub mod coordinator;
pub mod deepgram;

pub use base::{STTConfig, STTError, STTResult, TranscriptionProvider, TranscriptionStream};
pub use coordinator::{
    CoordinatorConfig, FinalTranscript, TranscriptCoordinator, TranscriptEvent,
    TranscriptEventKind, TranscriptHandle,
};
pub use deepgram::{DeepgramSTT, DeepgramSTTConfig};
