mod common;

use axum::http::{header, StatusCode};
use common::{test_app, test_app_with, write_fixture_wav};

#[tokio::test]
async fn traversal_is_rejected_before_filesystem_access() {
    let app = test_app().await;

    let (status, json) = app.json("GET", "/api/audio/../../etc/passwd", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid filename");

    let (status, _) = app
        .json("GET", "/api/download/..%2F..%2Fetc%2Fpasswd", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_audio_is_not_found() {
    let app = test_app().await;

    let (status, json) = app.json("GET", "/api/audio/nothing.wav", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "audio not found");

    let (status, _) = app
        .json("GET", "/api/download/nothing.wav?format=mp3", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_names_resolve_to_basename() {
    let app = test_app().await;
    write_fixture_wav(&app.path("audio/clip.wav"));

    let (status, headers, _) = app.request("GET", "/api/audio/some/dir/clip.wav", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
}

#[tokio::test]
async fn wav_download_is_an_attachment() {
    let app = test_app().await;
    write_fixture_wav(&app.path("audio/clip.wav"));

    for uri in [
        "/api/download/clip.wav",
        "/api/download/clip.wav?format=flac",
        "/api/download/clip.wav?format=WAV",
    ] {
        let (status, headers, _) = app.request("GET", uri, None).await;
        assert_eq!(status, StatusCode::OK, "uri: {uri}");
        assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"clip.wav\""
        );
    }
    assert_eq!(app.ffmpeg_calls(), 0);
}

#[tokio::test]
async fn not_modified_reply_carries_no_download_headers() {
    let app = test_app().await;
    write_fixture_wav(&app.path("audio/clip.wav"));

    let (status, headers, _) = app.request("GET", "/api/download/clip.wav", None).await;
    assert_eq!(status, StatusCode::OK);
    let last_modified = headers[header::LAST_MODIFIED].to_str().unwrap().to_string();

    let (status, headers, body) = app
        .request_with_headers(
            "GET",
            "/api/download/clip.wav",
            None,
            &[("if-modified-since", last_modified.as_str())],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
    assert!(headers.get(header::CONTENT_TYPE).is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn mp3_is_converted_once() {
    let app = test_app().await;
    write_fixture_wav(&app.path("audio/clip.wav"));

    let (status, headers, _) = app
        .request("GET", "/api/download/clip.wav?format=mp3", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"clip.mp3\""
    );
    assert!(app.path("audio/clip.mp3").is_file());

    let (status, _, _) = app
        .request("GET", "/api/download/clip.wav?format=mp3", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.ffmpeg_calls(), 1);

    let (_, headers, _) = app
        .request("GET", "/api/download/clip.wav?format=ogg", None)
        .await;
    assert_eq!(headers[header::CONTENT_TYPE], "audio/ogg");
    assert_eq!(app.ffmpeg_calls(), 2);
}

#[tokio::test]
async fn missing_converter_is_not_implemented() {
    let app = test_app_with(|config, root| {
        config.audio.converter_binary = root.join("bin/no-such-ffmpeg");
    })
    .await;
    write_fixture_wav(&app.path("audio/clip.wav"));

    let (status, json) = app
        .json("GET", "/api/download/clip.wav?format=ogg", None)
        .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(json["error"].as_str().unwrap().contains("mp3/ogg"));

    let (status, _, _) = app.request("GET", "/api/download/clip.wav", None).await;
    assert_eq!(status, StatusCode::OK);
}
