mod common;

use axum::http::StatusCode;
use common::{test_app, DEFAULT_VOICE};

#[tokio::test]
async fn voices_lists_catalog_and_default() {
    let app = test_app().await;
    app.install_model(DEFAULT_VOICE);

    let (status, json) = app.json("GET", "/api/voices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["default"], DEFAULT_VOICE);

    let voices = json["voices"].as_array().unwrap();
    assert_eq!(voices[0]["id"], DEFAULT_VOICE);
    assert_eq!(voices[0]["label"], "test default");
    assert_eq!(voices[0]["model"], "test_default.onnx");
    assert!(voices.iter().any(|v| v["id"] == "kitten:en-us:expr-voice-2-f"));

    let catalog = json["catalog"].as_array().unwrap();
    let lessac = catalog
        .iter()
        .find(|v| v["id"] == "en_US-lessac-medium")
        .unwrap();
    assert_eq!(lessac["installed"], false);
    assert_eq!(lessac["isDefault"], false);
    assert_eq!(lessac["kind"], "piper");
    assert!(lessac["sourceUrl"].as_str().unwrap().starts_with("https://"));
    assert!(catalog.iter().any(|v| v["kind"] == "provider"));
}

#[tokio::test]
async fn install_validates_input() {
    let app = test_app().await;

    let (status, json) = app.json("POST", "/api/voices/install", Some("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "voice is required");

    let (status, _) = app.json("POST", "/api/voices/install", Some("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .json("POST", "/api/voices/install", Some(r#"{"voice":"../x"}"#))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid voice id");

    let (status, json) = app
        .json("POST", "/api/voices/install", Some(r#"{"voice":"xx_XX-nobody"}"#))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("not in catalog"));
}

#[tokio::test]
async fn install_of_present_voice_skips_download() {
    let app = test_app().await;
    app.install_model("en_US-amy-medium");

    let (status, json) = app
        .json("POST", "/api/voices/install", Some(r#"{"voice":"en_US-amy-medium"}"#))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["ok"], true);
    assert_eq!(json["voice"], "en_US-amy-medium");
    assert_eq!(json["downloaded"], false);
}

#[tokio::test]
async fn default_voice_cannot_be_deleted() {
    let app = test_app().await;
    app.install_model(DEFAULT_VOICE);

    let (status, json) = app
        .json("DELETE", &format!("/api/voices/{DEFAULT_VOICE}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("cannot uninstall default voice"));
    assert!(app.path("voices/test_default.onnx").is_file());
}

#[tokio::test]
async fn delete_removes_voice_files() {
    let app = test_app().await;
    app.install_model("en_GB-alan-medium");

    let (status, json) = app
        .json("DELETE", "/api/voices/en_GB-alan-medium", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["removed"], true);
    assert!(!app.path("voices/en_GB-alan-medium.onnx").exists());
    assert!(!app.path("voices/en_GB-alan-medium.onnx.json").exists());

    let (status, json) = app
        .json("DELETE", "/api/voices/en_GB-alan-medium", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], false);
}

#[tokio::test]
async fn provider_voices_install_and_uninstall() {
    let app = test_app().await;
    let id = "kitten:en-us:expr-voice-3-m";

    let (status, json) = app
        .json("POST", "/api/voices/install", Some(&format!(r#"{{"voice":"{id}"}}"#)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["voice"], id);
    assert_eq!(json["downloaded"], false);

    let (_, json) = app.json("GET", "/api/voices", None).await;
    assert!(json["voices"].as_array().unwrap().iter().any(|v| v["id"] == id));

    let (status, json) = app.json("DELETE", &format!("/api/voices/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);

    let (status, _) = app
        .json("DELETE", "/api/voices/kitten:en-us:expr-voice-9-x", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
