#![cfg(unix)]

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use opentts_store::StateStore;
use opentts_types::{CatalogEntry, SettingsDefaults};
use opentts_voice::{
    ProviderError, ProviderHandle, ProviderLoader, ProviderRequest, SpeakRequest, SpeechProvider,
    TtsService, VoiceCatalog, VoiceConfig, VoiceError,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const DEFAULT: &str = "test_default";
const FIXTURE_SAMPLES: usize = 1600;

fn write_fixture(path: &Path) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..FIXTURE_SAMPLES {
        writer.write_sample(((i % 100) as i16) * 100).unwrap();
    }
    writer.finalize().unwrap();
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Records its arguments and stdin, then copies the fixture to
/// `--output_file`.
const FAKE_PIPER: &str = r#"dir=$(dirname "$0")
echo "$@" > "$dir/args.txt"
cat > "$dir/stdin.txt"
while [ $# -gt 0 ]; do
  if [ "$1" = "--output_file" ]; then out="$2"; fi
  shift
done
cp "$dir/fixture.wav" "$out""#;

/// Records every request; optionally rejects the speed argument.
#[derive(Default)]
struct FakeProvider {
    fixture: PathBuf,
    reject_speed: bool,
    calls: Mutex<Vec<(String, String, Option<f32>)>>,
}

impl SpeechProvider for FakeProvider {
    fn synthesize(&self, request: &ProviderRequest<'_>, output: &Path) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push((
            request.text.to_string(),
            request.style.to_string(),
            request.speed,
        ));
        if self.reject_speed && request.speed.is_some() {
            return Err(ProviderError::SpeedUnsupported);
        }
        std::fs::copy(&self.fixture, output)?;
        Ok(())
    }
}

struct FakeLoader(Arc<FakeProvider>);

impl ProviderLoader for FakeLoader {
    fn load(&self) -> Result<Arc<dyn SpeechProvider>, ProviderError> {
        Ok(self.0.clone())
    }
}

struct Harness {
    root: TempDir,
    tts: TtsService,
    store: Arc<StateStore>,
    provider: Arc<FakeProvider>,
}

impl Harness {
    fn bin_dir(&self) -> PathBuf {
        self.root.path().join("bin")
    }

    fn args(&self) -> String {
        std::fs::read_to_string(self.bin_dir().join("args.txt")).unwrap()
    }

    fn install_model(&self, id: &str) {
        let voices = self.root.path().join("voices");
        std::fs::create_dir_all(&voices).unwrap();
        std::fs::write(voices.join(format!("{id}.onnx")), b"model").unwrap();
    }
}

fn setup_with(piper_body: &str, timeout: Duration, reject_speed: bool) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    write_fixture(&bin.join("fixture.wav"));
    write_script(&bin.join("piper"), piper_body);

    let config = VoiceConfig {
        voices_dir: root.path().join("voices"),
        audio_dir: root.path().join("audio"),
        default_voice: DEFAULT.to_string(),
        default_voice_base: "http://127.0.0.1:9".to_string(),
        piper_binary: bin.join("piper"),
        synthesis_timeout: timeout,
    };
    let store = Arc::new(StateStore::new(
        root.path().join("state"),
        root.path().join("voices"),
        SettingsDefaults::default(),
    ));
    let catalog = Arc::new(
        VoiceCatalog::new(&config, store.clone())
            .with_entries(vec![CatalogEntry::new(DEFAULT, "Default", "http://127.0.0.1:9")]),
    );
    let provider = Arc::new(FakeProvider {
        fixture: bin.join("fixture.wav"),
        reject_speed,
        ..FakeProvider::default()
    });
    let handle = ProviderHandle::new(Arc::new(FakeLoader(provider.clone())));

    Harness {
        tts: TtsService::new(&config, catalog, handle),
        root,
        store,
        provider,
    }
}

fn setup() -> Harness {
    setup_with(FAKE_PIPER, Duration::from_secs(10), false)
}

fn request(text: &str, voice: Option<&str>, speed: Option<f64>) -> SpeakRequest {
    SpeakRequest {
        text: text.to_string(),
        voice: voice.map(str::to_string),
        speed,
        prepend_silence_ms: None,
    }
}

#[tokio::test]
async fn speak_writes_playable_wav() {
    let h = setup();
    h.install_model(DEFAULT);

    let out = h.tts.speak(request("  Hello there  ", None, None)).await.unwrap();

    assert!(out.file_name.ends_with(".wav"));
    assert_eq!(out.file_name.len(), 32 + 4);
    assert_eq!(out.path, h.root.path().join("audio").join(&out.file_name));
    assert_eq!(out.voice, DEFAULT);
    assert_eq!(out.speed, 1.0);

    let reader = WavReader::open(&out.path).unwrap();
    assert_eq!(reader.len() as usize, FIXTURE_SAMPLES);

    let stdin = std::fs::read_to_string(h.bin_dir().join("stdin.txt")).unwrap();
    assert_eq!(stdin, "Hello there");
    let args = h.args();
    assert!(args.contains("--model"));
    assert!(args.contains(&format!("{DEFAULT}.onnx")));
    assert!(args.contains("--length_scale 1"));
}

#[tokio::test]
async fn speed_is_clamped_before_piper_runs() {
    let h = setup();
    h.install_model(DEFAULT);

    let out = h.tts.speak(request("fast", None, Some(5.0))).await.unwrap();
    assert_eq!(out.speed, 2.0);
    assert!(h.args().contains("--length_scale 0.5"));

    let out = h.tts.speak(request("slow", None, Some(0.1))).await.unwrap();
    assert_eq!(out.speed, 0.5);
    assert!(h.args().contains("--length_scale 2"));

    let out = h.tts.speak(request("odd", None, Some(1.5))).await.unwrap();
    assert_eq!(out.speed, 1.5);
    assert!(h.args().contains("--length_scale 0.667"));
}

#[tokio::test]
async fn missing_voice_falls_back_to_default() {
    let h = setup();
    h.install_model(DEFAULT);

    let out = h
        .tts
        .speak(request("hi", Some("not_installed"), None))
        .await
        .unwrap();
    assert_eq!(out.voice, DEFAULT);

    let out = h.tts.speak(request("hi", Some("../../evil"), None)).await.unwrap();
    assert_eq!(out.voice, DEFAULT);
}

#[tokio::test]
async fn requested_voice_is_used_when_installed() {
    let h = setup();
    h.install_model(DEFAULT);
    h.install_model("other_voice");

    let out = h.tts.speak(request("hi", Some("other_voice"), None)).await.unwrap();
    assert_eq!(out.voice, "other_voice");
    assert!(h.args().contains("other_voice.onnx"));
}

#[tokio::test]
async fn no_installed_model_is_voice_not_found() {
    let h = setup();

    let result = h.tts.speak(request("hi", Some("nope"), None)).await;
    assert!(matches!(result, Err(VoiceError::VoiceNotFound(v)) if v == "nope"));
}

#[tokio::test]
async fn blank_text_is_rejected() {
    let h = setup();
    h.install_model(DEFAULT);

    let result = h.tts.speak(request(" \n\t ", None, None)).await;
    assert!(matches!(result, Err(VoiceError::InvalidRequest(_))));
}

#[tokio::test]
async fn silence_is_prepended() {
    let h = setup();
    h.install_model(DEFAULT);

    let mut req = request("hi", None, None);
    req.prepend_silence_ms = Some(100);
    let out = h.tts.speak(req).await.unwrap();

    let mut reader = WavReader::open(&out.path).unwrap();
    assert_eq!(reader.spec().sample_rate, 16_000);
    assert_eq!(reader.len() as usize, FIXTURE_SAMPLES + 1600);
    let leading: Vec<i16> = reader.samples::<i16>().take(1600).map(Result::unwrap).collect();
    assert!(leading.iter().all(|s| *s == 0));
}

#[tokio::test]
async fn piper_failure_carries_stderr() {
    let h = setup_with("echo 'model load failed' >&2\nexit 3", Duration::from_secs(10), false);
    h.install_model(DEFAULT);

    let result = h.tts.speak(request("hi", None, None)).await;
    match result {
        Err(VoiceError::Synthesis { stderr }) => assert!(stderr.contains("model load failed")),
        other => panic!("expected synthesis error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_piper_times_out() {
    let h = setup_with("sleep 5", Duration::from_millis(200), false);
    h.install_model(DEFAULT);

    let result = h.tts.speak(request("hi", None, None)).await;
    assert!(matches!(result, Err(VoiceError::SynthesisTimeout(_))), "got {result:?}");
}

#[tokio::test]
async fn provider_voice_must_be_enabled() {
    let h = setup();

    let result = h
        .tts
        .speak(request("hi", Some("kitten:en-us:expr-voice-5-f"), None))
        .await;
    assert!(matches!(result, Err(VoiceError::NotEnabled(_))), "got {result:?}");
    assert!(h.provider.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_voice_is_synthesized() {
    let h = setup();
    h.store.enable_provider_voice("kitten:en-us:expr-voice-3-f").unwrap();

    let out = h
        .tts
        .speak(request("hello", Some("kitten:en-us:expr-voice-3-f"), Some(1.25)))
        .await
        .unwrap();

    assert_eq!(out.voice, "kitten:en-us:expr-voice-3-f");
    assert!(out.path.is_file());
    let calls = h.provider.calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![("hello".to_string(), "expr-voice-3-f".to_string(), Some(1.25))]
    );
}

#[tokio::test]
async fn provider_speed_rejection_retries_without_speed() {
    let h = setup_with(FAKE_PIPER, Duration::from_secs(10), true);
    h.store.enable_provider_voice("kitten:en-us:expr-voice-2-m").unwrap();

    let out = h
        .tts
        .speak(request("hello", Some("kitten:en-us:expr-voice-2-m"), Some(2.0)))
        .await
        .unwrap();

    assert!(out.path.is_file());
    let speeds: Vec<Option<f32>> = h
        .provider
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, _, speed)| *speed)
        .collect();
    assert_eq!(speeds, vec![Some(2.0), None]);
}
