//! Open-TTS server library logic.

pub mod api;
pub mod api_audio;
pub mod api_docs;
pub mod api_speak;
pub mod api_state;
pub mod api_voices;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use config::{Config, LoggingConfig};
use opentts_store::StateStore;
use opentts_types::settings::MAX_PREPEND_SILENCE_MS;
use opentts_types::SettingsDefaults;
use opentts_voice::{AudioConverter, KittenLoader, ProviderHandle, TtsService, VoiceCatalog};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Maximum request body size (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Installed and installable voices.
    pub catalog: Arc<VoiceCatalog>,
    /// Synthesis dispatcher.
    pub tts: Arc<TtsService>,
    /// Converter for mp3/ogg downloads.
    pub converter: AudioConverter,
    /// Settings, history and enabled provider voices.
    pub store: Arc<StateStore>,
    /// Directory holding generated audio.
    pub audio_dir: PathBuf,
    /// Silence prepended when a speak request does not specify any.
    pub default_prepend_silence_ms: u32,
    /// Static frontend, served when it contains `index.html`.
    pub frontend_dir: Option<PathBuf>,
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Installs the global tracing subscriber.
///
/// Falls back to `info` when `config.level` is not a valid filter.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Prepares everything the router needs.
///
/// Creates the data directories, settles the enabled provider voice set,
/// then downloads the default voice if it is missing. A failed download is
/// logged; the server still starts.
///
/// # Errors
///
/// Returns `StartupError` if a data directory cannot be created.
pub async fn prepare_server(config: &Config) -> Result<AppState, StartupError> {
    for dir in [&config.voices.dir, &config.audio.dir, &config.state.dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StartupError::CreateDir {
                path: dir.clone(),
                source,
            })?;
    }

    let default_prepend_silence_ms = config.audio.prepend_silence_ms.min(MAX_PREPEND_SILENCE_MS);
    let store = Arc::new(StateStore::new(
        &config.state.dir,
        &config.voices.dir,
        SettingsDefaults {
            voice: config.voices.default_voice.clone(),
            prepend_silence_ms: default_prepend_silence_ms,
        },
    ));

    // Must run before the default voice lands on disk, or a fresh install
    // would be mistaken for an existing one.
    let enabled = store.enabled_provider_voices();
    tracing::info!(count = enabled.len(), "provider voices enabled");

    let voice_config = config.voice_config();
    let catalog = Arc::new(VoiceCatalog::new(&voice_config, store.clone()));

    match catalog.ensure_default_voice().await {
        Ok(true) => tracing::info!(voice = %catalog.default_voice(), "default voice downloaded"),
        Ok(false) => tracing::debug!(voice = %catalog.default_voice(), "default voice present"),
        Err(e) => tracing::warn!(
            voice = %catalog.default_voice(),
            error = %e,
            "failed to provision default voice"
        ),
    }

    let provider = ProviderHandle::new(Arc::new(KittenLoader::new(config.kitten_config())));
    let tts = Arc::new(TtsService::new(&voice_config, catalog.clone(), provider));

    let converter = AudioConverter::new(config.converter_config());
    if !converter.is_available() {
        tracing::info!(
            binary = %config.audio.converter_binary.display(),
            "converter not found, mp3/ogg downloads disabled"
        );
    }

    Ok(AppState {
        catalog,
        tts,
        converter,
        store,
        audio_dir: config.audio.dir.clone(),
        default_prepend_silence_ms,
        frontend_dir: config.frontend.dir.clone(),
    })
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/openapi.json", get(api_docs::openapi_handler))
        .route("/api/docs", get(api_docs::docs_handler))
        .route("/api/voices", get(api_voices::list_voices_handler))
        .route(
            "/api/voices/install",
            post(api_voices::install_voice_handler),
        )
        .route(
            "/api/voices/{voice_id}",
            delete(api_voices::uninstall_voice_handler),
        )
        .route("/api/speak", post(api_speak::speak_handler))
        .route("/api/audio/{*name}", get(api_audio::audio_handler))
        .route("/api/download/{*name}", get(api_audio::download_handler))
        .route(
            "/api/settings",
            get(api_state::get_settings_handler).put(api_state::put_settings_handler),
        )
        .route(
            "/api/history",
            get(api_state::get_history_handler)
                .put(api_state::put_history_handler)
                .post(api_state::post_history_handler),
        );

    let router = match &state.frontend_dir {
        Some(dir) if dir.join("index.html").is_file() => {
            tracing::info!(path = %dir.display(), "serving frontend static files");
            router.fallback_service(
                ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
            )
        }
        Some(dir) => {
            tracing::info!(path = %dir.display(), "frontend directory has no index.html, skipping");
            router
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
