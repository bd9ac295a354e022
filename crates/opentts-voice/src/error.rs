use crate::provider::ProviderError;
use opentts_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("voice not in catalog: {0}")]
    NotFound(String),

    #[error("voice not enabled: {0}")]
    NotEnabled(String),

    #[error("voice not found: {0}")]
    VoiceNotFound(String),

    #[error("cannot uninstall default voice: {0}")]
    DefaultVoice(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("piper synthesis failed")]
    Synthesis { stderr: String },

    #[error("piper synthesis timed out after {0} seconds")]
    SynthesisTimeout(u64),

    #[error("provider synthesis failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0} is required for mp3/ogg conversion")]
    ConversionUnavailable(String),

    #[error("audio conversion failed")]
    Conversion { stderr: String },

    #[error("audio conversion timed out after {0} seconds")]
    ConversionTimeout(u64),

    #[error("audio not found: {0}")]
    AudioNotFound(String),

    #[error("invalid wav file: {0}")]
    Wav(#[from] hound::Error),

    #[error("state error: {0}")]
    State(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
