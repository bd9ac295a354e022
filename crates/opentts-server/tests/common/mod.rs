#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use opentts_server::config::Config;
use opentts_server::{app, prepare_server, AppState};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower::ServiceExt;

pub const DEFAULT_VOICE: &str = "test_default";

/// Copies a short WAV fixture to `--output_file` and records its arguments.
pub const FAKE_PIPER: &str = r#"#!/bin/sh
dir=$(dirname "$0")
echo "$@" > "$dir/piper-args.txt"
cat > /dev/null
while [ $# -gt 0 ]; do
  if [ "$1" = "--output_file" ]; then out="$2"; fi
  shift
done
cp "$dir/fixture.wav" "$out"
"#;

/// Counts runs in `ffmpeg-calls.txt` and copies input to output.
pub const FAKE_FFMPEG: &str = r#"#!/bin/sh
echo run >> "$(dirname "$0")/ffmpeg-calls.txt"
cp "$3" "$4"
"#;

pub struct TestApp {
    pub root: TempDir,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    pub fn install_model(&self, id: &str) {
        let voices = self.path("voices");
        std::fs::write(voices.join(format!("{id}.onnx")), b"model").unwrap();
        std::fs::write(voices.join(format!("{id}.onnx.json")), b"{}").unwrap();
    }

    pub fn ffmpeg_calls(&self) -> usize {
        std::fs::read_to_string(self.path("bin/ffmpeg-calls.txt"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, HeaderMap, Bytes) {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: &str,
        uri: &str,
        body: Option<&str>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, HeaderMap, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes)
    }

    pub async fn json(&self, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let (status, _, bytes) = self.request(method, uri, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

pub fn write_fixture_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..800 {
        writer.write_sample((i % 64) as i16 * 50).unwrap();
    }
    writer.finalize().unwrap();
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// Builds the app over a temporary data root. Nothing is reachable on the
/// network; default-voice provisioning fails and is only logged.
pub async fn test_app_with(configure: impl FnOnce(&mut Config, &Path)) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    write_fixture_wav(&bin.join("fixture.wav"));
    write_script(&bin.join("piper"), FAKE_PIPER);
    write_script(&bin.join("ffmpeg"), FAKE_FFMPEG);

    let mut config = Config::default();
    config.voices.dir = root.path().join("voices");
    config.voices.default_voice = DEFAULT_VOICE.to_string();
    config.voices.default_voice_base = "http://127.0.0.1:9".to_string();
    config.voices.piper_binary = bin.join("piper");
    config.voices.timeout_seconds = 10;
    config.audio.dir = root.path().join("audio");
    config.audio.converter_binary = bin.join("ffmpeg");
    config.state.dir = root.path().join("state");
    config.provider.binary = bin.join("no-kitten");
    config.provider.data_dir = root.path().join("kitten");
    configure(&mut config, root.path());

    let state = prepare_server(&config).await.unwrap();
    let router = app(state.clone());
    TestApp {
        root,
        state,
        router,
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(|_, _| {}).await
}
