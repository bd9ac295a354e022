//! Voice management and speech synthesis for Open-TTS.
//!
//! The [`VoiceCatalog`] knows which voices can be installed and which are on
//! disk. [`TtsService`] dispatches a request either to the Piper binary or to
//! the secondary provider behind a [`ProviderHandle`], then hands the result
//! to the audio post-processor for optional leading silence. Format
//! conversion for downloads lives in [`AudioConverter`].
//!
//! Synthesis engines and the converter are external programs; this crate
//! only drives them and checks their exit status.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod provider;
pub mod tts;

pub use audio::{prepend_silence, resolve_binary, safe_audio_filename, AudioConverter, ConvertedAudio};
pub use catalog::{InstallOutcome, UninstallOutcome, VoiceCatalog};
pub use config::{ConverterConfig, KittenConfig, VoiceConfig, DEFAULT_VOICE, DEFAULT_VOICE_BASE};
pub use error::VoiceError;
pub use provider::{
    KittenCli, KittenLoader, ProviderError, ProviderHandle, ProviderLoader, ProviderRequest,
    SpeechProvider,
};
pub use tts::{effective_speed, length_scale, SpeakRequest, SpeechOutput, TtsService};
