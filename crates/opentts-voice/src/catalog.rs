//! Voice catalog: what can be installed, what is installed, and how to get
//! it there.
//!
//! Piper voices are installed when their model file is present in the
//! voices directory. Provider voices are installed when their composite id
//! is in the persisted enabled set.

use crate::config::VoiceConfig;
use crate::error::VoiceError;
use opentts_store::StateStore;
use opentts_types::voice::{piper_catalog, PROVIDER_NAME};
use opentts_types::{
    is_valid_voice_id, CatalogEntry, InstalledVoice, ProviderVoiceId, VoiceDescriptor, VoiceKind,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Timeout for a single model or config download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of an install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Canonical id of the installed voice.
    pub voice: String,
    /// Whether anything was fetched over the network.
    pub downloaded: bool,
}

/// Result of an uninstall request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    pub voice: String,
    /// False when there was nothing to remove.
    pub removed: bool,
}

#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    voices_dir: PathBuf,
    default_voice: String,
    default_voice_base: String,
    entries: Vec<CatalogEntry>,
    store: Arc<StateStore>,
    http: reqwest::Client,
}

impl VoiceCatalog {
    /// Creates a catalog over the built-in Piper voice list.
    pub fn new(config: &VoiceConfig, store: Arc<StateStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build download client, using defaults");
                reqwest::Client::new()
            });

        Self {
            voices_dir: config.voices_dir.clone(),
            default_voice: config.default_voice.clone(),
            default_voice_base: config.default_voice_base.clone(),
            entries: piper_catalog(),
            store,
            http,
        }
    }

    /// Replaces the built-in Piper voice list.
    pub fn with_entries(mut self, entries: Vec<CatalogEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    pub fn model_path(&self, voice_id: &str) -> PathBuf {
        self.voices_dir.join(format!("{voice_id}.onnx"))
    }

    pub fn config_path(&self, voice_id: &str) -> PathBuf {
        self.voices_dir.join(format!("{voice_id}.onnx.json"))
    }

    /// Returns the model path if `voice_id` is a safe id whose model exists.
    pub fn installed_model(&self, voice_id: &str) -> Option<PathBuf> {
        if !is_valid_voice_id(voice_id) {
            return None;
        }
        let path = self.model_path(voice_id);
        path.is_file().then_some(path)
    }

    pub fn is_provider_voice_enabled(&self, voice: &ProviderVoiceId) -> bool {
        self.store
            .enabled_provider_voices()
            .contains(&voice.to_string())
    }

    /// Installed Piper voices (sorted by file name) followed by the enabled
    /// provider voices.
    pub fn list_installed(&self) -> Vec<InstalledVoice> {
        let mut models: Vec<PathBuf> = match std::fs::read_dir(&self.voices_dir) {
            Ok(entries) => entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("onnx"))
                .collect(),
            Err(e) => {
                tracing::debug!(path = %self.voices_dir.display(), error = %e, "voices directory unreadable");
                Vec::new()
            }
        };
        models.sort();

        let mut voices: Vec<InstalledVoice> = models
            .iter()
            .filter_map(|path| {
                let id = path.file_stem()?.to_str()?.to_string();
                let model = path.file_name()?.to_str()?.to_string();
                Some(InstalledVoice {
                    label: id.replace('_', " "),
                    id,
                    model,
                })
            })
            .collect();

        voices.extend(
            self.store
                .enabled_provider_voices()
                .into_iter()
                .filter_map(|id| id.parse::<ProviderVoiceId>().ok())
                .map(|voice| InstalledVoice {
                    id: voice.to_string(),
                    label: voice.label(),
                    model: PROVIDER_NAME.to_string(),
                }),
        );

        voices
    }

    /// The full catalog (Piper voices, then provider voices) annotated with
    /// installation status.
    pub fn list_catalog_with_status(&self) -> Vec<VoiceDescriptor> {
        let installed: HashSet<String> = self
            .list_installed()
            .into_iter()
            .map(|voice| voice.id)
            .collect();

        let piper = self.entries.iter().map(|entry| VoiceDescriptor {
            id: entry.id.clone(),
            label: entry.label.clone(),
            kind: VoiceKind::Piper,
            source_url: Some(entry.base_url.clone()),
            installed: installed.contains(&entry.id),
            is_default: entry.id == self.default_voice,
        });

        let provider = ProviderVoiceId::catalog().into_iter().map(|voice| {
            let id = voice.to_string();
            VoiceDescriptor {
                installed: installed.contains(&id),
                label: voice.label(),
                id,
                kind: VoiceKind::Provider,
                source_url: None,
                is_default: false,
            }
        });

        piper.chain(provider).collect()
    }

    /// Installs a voice.
    ///
    /// Provider voices are added to the enabled set. Piper voices are
    /// downloaded; files already on disk are not fetched again.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for a blank or unsafe id.
    /// - `NotFound` for ids absent from the catalog.
    /// - `Download` if a remote fetch fails.
    pub async fn install(&self, voice_id: &str) -> Result<InstallOutcome, VoiceError> {
        let voice_id = voice_id.trim();
        if voice_id.is_empty() {
            return Err(VoiceError::InvalidRequest("voice is required".to_string()));
        }

        if ProviderVoiceId::looks_composite(voice_id) {
            let voice = parse_provider_voice(voice_id)?;
            let canonical = voice.to_string();
            let store = self.store.clone();
            let id = canonical.clone();
            let changed = tokio::task::spawn_blocking(move || store.enable_provider_voice(&id))
                .await
                .map_err(|e| VoiceError::Io(std::io::Error::other(e)))??;
            tracing::info!(voice = %canonical, changed, "provider voice enabled");
            return Ok(InstallOutcome {
                voice: canonical,
                downloaded: false,
            });
        }

        if !is_valid_voice_id(voice_id) {
            return Err(VoiceError::InvalidRequest("invalid voice id".to_string()));
        }

        let entry = self
            .entries
            .iter()
            .find(|entry| entry.id == voice_id)
            .ok_or_else(|| VoiceError::NotFound(voice_id.to_string()))?;

        let downloaded = self.download_voice(entry).await?;
        tracing::info!(voice = %voice_id, downloaded, "piper voice installed");

        Ok(InstallOutcome {
            voice: voice_id.to_string(),
            downloaded,
        })
    }

    /// Removes a voice.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an unsafe id.
    /// - `DefaultVoice` when asked to remove the configured default.
    /// - `NotFound` for unknown provider voices.
    pub fn uninstall(&self, voice_id: &str) -> Result<UninstallOutcome, VoiceError> {
        let voice_id = voice_id.trim();

        if ProviderVoiceId::looks_composite(voice_id) {
            let voice = parse_provider_voice(voice_id)?;
            let canonical = voice.to_string();
            let removed = self.store.disable_provider_voice(&canonical)?;
            tracing::info!(voice = %canonical, removed, "provider voice disabled");
            return Ok(UninstallOutcome {
                voice: canonical,
                removed,
            });
        }

        if !is_valid_voice_id(voice_id) {
            return Err(VoiceError::InvalidRequest("invalid voice id".to_string()));
        }
        if voice_id == self.default_voice {
            return Err(VoiceError::DefaultVoice(voice_id.to_string()));
        }

        let mut removed = false;
        for path in [self.model_path(voice_id), self.config_path(voice_id)] {
            if path.exists() {
                std::fs::remove_file(&path)?;
                removed = true;
            }
        }
        tracing::info!(voice = %voice_id, removed, "piper voice uninstalled");

        Ok(UninstallOutcome {
            voice: voice_id.to_string(),
            removed,
        })
    }

    /// Downloads the default voice if either of its files is missing.
    ///
    /// Uses the catalog entry when there is one, else the configured
    /// default-voice base URL. Returns whether anything was downloaded.
    pub async fn ensure_default_voice(&self) -> Result<bool, VoiceError> {
        if !is_valid_voice_id(&self.default_voice) {
            return Err(VoiceError::InvalidRequest(format!(
                "invalid default voice id: {}",
                self.default_voice
            )));
        }

        let entry = self
            .entries
            .iter()
            .find(|entry| entry.id == self.default_voice)
            .cloned()
            .unwrap_or_else(|| {
                CatalogEntry::new(
                    self.default_voice.clone(),
                    self.default_voice.clone(),
                    self.default_voice_base.clone(),
                )
            });

        self.download_voice(&entry).await
    }

    async fn download_voice(&self, entry: &CatalogEntry) -> Result<bool, VoiceError> {
        let mut downloaded = false;

        let model_path = self.model_path(&entry.id);
        if !tokio::fs::try_exists(&model_path).await? {
            self.download_file(&entry.model_url(), &model_path).await?;
            downloaded = true;
        }

        let config_path = self.config_path(&entry.id);
        if !tokio::fs::try_exists(&config_path).await? {
            self.download_file(&entry.config_url(), &config_path).await?;
            downloaded = true;
        }

        Ok(downloaded)
    }

    /// Streams `url` into a uniquely named temporary file in the voices
    /// directory, then persists it as `target`. The temporary file is removed
    /// on any failure.
    async fn download_file(&self, url: &str, target: &Path) -> Result<(), VoiceError> {
        tracing::info!(%url, target = %target.display(), "downloading voice file");

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| VoiceError::Download(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::Download(format!("{url}: HTTP {status}")));
        }

        tokio::fs::create_dir_all(&self.voices_dir).await?;
        let voices_dir = self.voices_dir.clone();
        let partial = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(".download-")
                .suffix(".part")
                .tempfile_in(voices_dir)
        })
        .await
        .map_err(|e| VoiceError::Io(std::io::Error::other(e)))??;

        let mut file = tokio::fs::File::from_std(partial.reopen()?);
        let mut bytes = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| VoiceError::Download(format!("{url}: {e}")))?
        {
            file.write_all(&chunk).await?;
            bytes += chunk.len();
        }
        file.flush().await?;
        drop(file);

        let destination = target.to_path_buf();
        tokio::task::spawn_blocking(move || partial.persist(destination))
            .await
            .map_err(|e| VoiceError::Io(std::io::Error::other(e)))?
            .map_err(|e| VoiceError::Io(e.error))?;

        tracing::info!(target = %target.display(), bytes, "voice file saved");
        Ok(())
    }
}

fn parse_provider_voice(voice_id: &str) -> Result<ProviderVoiceId, VoiceError> {
    voice_id
        .parse::<ProviderVoiceId>()
        .ok()
        .filter(ProviderVoiceId::is_supported)
        .ok_or_else(|| VoiceError::NotFound(voice_id.to_string()))
}
