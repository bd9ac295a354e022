//! `opentts-speak`: sends text to a running Open-TTS server and opens or
//! saves the resulting WAV.
//!
//! Meant to be bound as a qutebrowser userscript. Text is taken from the
//! command line, else the page URL (`--page`), else the current selection.
//! Messages go to `QUTE_FIFO` when it is set, otherwise to stdout.

use opentts_client::{SpeakClient, DEFAULT_API_URL};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Default, PartialEq)]
struct Args {
    page: bool,
    out: Option<PathBuf>,
    text: Option<String>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut words = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--page" => parsed.page = true,
            "--out" => {
                let path = iter.next().ok_or("--out needs a path")?;
                parsed.out = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option: {flag}")),
            _ => words.push(arg),
        }
    }

    if !words.is_empty() {
        parsed.text = Some(words.join(" "));
    }
    Ok(parsed)
}

fn select_text(args: &Args, env: impl Fn(&str) -> Option<String>) -> String {
    let text = match &args.text {
        Some(text) => Some(text.clone()),
        None if args.page => env("QUTE_URL"),
        None => env("QUTE_SELECTED_TEXT"),
    };
    text.map(|t| t.trim().to_string()).unwrap_or_default()
}

fn quote(message: &str) -> String {
    format!("'{}'", message.replace('\'', "\\'"))
}

/// Writes qutebrowser commands to `QUTE_FIFO`, or plain text to stdout.
struct Reporter {
    fifo: Option<PathBuf>,
}

impl Reporter {
    fn from_env() -> Self {
        Self {
            fifo: std::env::var_os("QUTE_FIFO").map(PathBuf::from),
        }
    }

    fn send(&self, command: &str, plain: &str) {
        match &self.fifo {
            Some(path) => {
                let written = std::fs::OpenOptions::new()
                    .append(true)
                    .open(path)
                    .and_then(|mut fifo| writeln!(fifo, "{command}"));
                if let Err(e) = written {
                    eprintln!("failed to write to {}: {e}", path.display());
                    println!("{plain}");
                }
            }
            None => println!("{plain}"),
        }
    }

    fn info(&self, message: &str) {
        self.send(&format!("message-info {}", quote(message)), message);
    }

    fn error(&self, message: &str) {
        self.send(&format!("message-error {}", quote(message)), message);
        eprintln!("{message}");
    }

    fn open(&self, url: &str) {
        self.send(&format!("open -r {url}"), url);
    }
}

fn save_audio(bytes: &[u8], out: Option<&Path>) -> std::io::Result<PathBuf> {
    if let Some(path) = out {
        std::fs::write(path, bytes)?;
        return Ok(path.to_path_buf());
    }

    let mut file = tempfile::Builder::new()
        .prefix("open-tts-")
        .suffix(".wav")
        .tempfile()?;
    file.write_all(bytes)?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OPENTTS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let reporter = Reporter::from_env();
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            reporter.error(&format!("Open-TTS: {e}"));
            return ExitCode::from(2);
        }
    };

    let text = select_text(&args, |key| std::env::var(key).ok());
    if text.is_empty() {
        reporter.info("Open-TTS: no selected text.");
        return ExitCode::SUCCESS;
    }

    let api_url = std::env::var("OPEN_TTS_API")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let client = SpeakClient::new(api_url);
    tracing::debug!(api = client.api_url(), chars = text.len(), "sending speak request");

    let response = match client.speak(&text).await {
        Ok(response) => response,
        Err(e) => {
            reporter.error(&format!("Open-TTS: {e}"));
            return ExitCode::FAILURE;
        }
    };

    if args.out.is_none() && reporter.fifo.is_some() {
        reporter.open(&client.audio_url(&response));
        return ExitCode::SUCCESS;
    }

    let bytes = match client.fetch_audio(&response).await {
        Ok(bytes) => bytes,
        Err(e) => {
            reporter.error(&format!("Open-TTS: {e}"));
            return ExitCode::FAILURE;
        }
    };

    match save_audio(&bytes, args.out.as_deref()) {
        Ok(path) => {
            reporter.info(&format!("Open-TTS: saved {}", path.display()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            reporter.error(&format!("Open-TTS: failed to save audio: {e}"));
            ExitCode::FAILURE
        }
    }
}
