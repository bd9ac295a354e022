//! Secondary synthesis provider.
//!
//! The provider is a long-lived engine handle rather than a per-request
//! process. [`ProviderHandle`] owns it and builds it lazily through a
//! [`ProviderLoader`] the first time a provider voice is requested. Every
//! later request shares the same handle; concurrent calls against it are
//! left to the provider.

use crate::config::KittenConfig;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use wait_timeout::ChildExt;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider does not accept a speed argument.
    #[error("provider does not support the speed parameter")]
    SpeedUnsupported,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),

    #[error("provider timed out after {0} seconds")]
    Timeout(u64),

    #[error("provider io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One synthesis call against the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest<'a> {
    pub text: &'a str,
    pub language: &'a str,
    pub style: &'a str,
    /// `None` lets the provider use its own default pace.
    pub speed: Option<f32>,
}

/// A loaded provider engine. Calls block.
pub trait SpeechProvider: Send + Sync {
    /// Synthesizes `request` into a WAV file at `output`.
    fn synthesize(&self, request: &ProviderRequest<'_>, output: &Path)
        -> Result<(), ProviderError>;
}

/// Builds the provider, provisioning whatever it needs on first use.
pub trait ProviderLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn SpeechProvider>, ProviderError>;
}

/// Lazily initialised, shared provider engine.
pub struct ProviderHandle {
    loader: Arc<dyn ProviderLoader>,
    engine: OnceCell<Arc<dyn SpeechProvider>>,
}

impl ProviderHandle {
    pub fn new(loader: Arc<dyn ProviderLoader>) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
        }
    }

    /// Returns the engine, loading it on the first call.
    ///
    /// Concurrent first calls wait for a single load. A failed load is not
    /// cached; the next call tries again.
    pub async fn get(&self) -> Result<Arc<dyn SpeechProvider>, ProviderError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let loader = self.loader.clone();
                tracing::info!("loading speech provider");
                tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| ProviderError::Failed(format!("provider load task failed: {e}")))?
            })
            .await?;
        Ok(engine.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Loads the KittenTTS command-line engine.
#[derive(Debug, Clone)]
pub struct KittenLoader {
    config: KittenConfig,
}

impl KittenLoader {
    pub fn new(config: KittenConfig) -> Self {
        Self { config }
    }
}

impl ProviderLoader for KittenLoader {
    fn load(&self) -> Result<Arc<dyn SpeechProvider>, ProviderError> {
        let binary = crate::audio::resolve_binary(&self.config.binary).ok_or_else(|| {
            ProviderError::Unavailable(format!(
                "{} not found",
                self.config.binary.display()
            ))
        })?;

        std::fs::create_dir_all(&self.config.data_dir)?;
        tracing::info!(
            binary = %binary.display(),
            data_dir = %self.config.data_dir.display(),
            "kitten provider ready"
        );

        Ok(Arc::new(KittenCli {
            binary,
            data_dir: self.config.data_dir.clone(),
            timeout: self.config.timeout,
        }))
    }
}

/// KittenTTS driven through its command-line interface.
#[derive(Debug, Clone)]
pub struct KittenCli {
    binary: PathBuf,
    data_dir: PathBuf,
    timeout: Duration,
}

impl SpeechProvider for KittenCli {
    fn synthesize(
        &self,
        request: &ProviderRequest<'_>,
        output: &Path,
    ) -> Result<(), ProviderError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("synthesize")
            .arg("--voice")
            .arg(request.style)
            .arg("--language")
            .arg(request.language);
        if let Some(speed) = request.speed {
            command.arg("--speed").arg(speed.to_string());
        }
        command
            .arg("--output")
            .arg(output)
            .env("KITTEN_TTS_HOME", &self.data_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| ProviderError::Unavailable(format!("failed to spawn kitten-tts: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.text.as_bytes())?;
        }

        // Drained on its own thread; a full pipe would stall the engine.
        let stderr = child.stderr.take();
        let stderr_reader = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProviderError::Timeout(self.timeout.as_secs()));
            }
        };
        let stderr = stderr_reader.join().unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        if request.speed.is_some() && rejects_speed_flag(&stderr) {
            return Err(ProviderError::SpeedUnsupported);
        }
        Err(ProviderError::Failed(format!(
            "kitten-tts exited with {status}: {}",
            stderr.trim()
        )))
    }
}

fn rejects_speed_flag(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("--speed")
        && (lower.contains("unexpected argument")
            || lower.contains("unrecognized")
            || lower.contains("unknown option"))
}
