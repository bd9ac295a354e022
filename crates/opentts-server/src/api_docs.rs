//! OpenAPI document and Swagger UI page.

use axum::{
    http::{header, HeaderMap},
    response::Html,
    Json,
};
use serde_json::{json, Value};

const DOCS_HTML: &str = r##"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Open-TTS API Docs</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({
        url: "/api/openapi.json",
        dom_id: "#swagger-ui",
        presets: [SwaggerUIBundle.presets.apis]
      });
    </script>
  </body>
</html>"##;

fn path_param(name: &str) -> Value {
    json!({ "name": name, "in": "path", "required": true, "schema": { "type": "string" } })
}

fn json_body(properties: Value, required: &[&str]) -> Value {
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "type": "object", "properties": properties, "required": required }
            }
        }
    })
}

fn ok(status: &str, description: &str) -> Value {
    json!({ status: { "description": description } })
}

/// Builds the OpenAPI 3.0.3 document for the service rooted at `base_url`.
pub fn openapi_document(base_url: &str) -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Open-TTS API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "API for Piper-based text-to-speech, voice management, and downloadable audio.",
        },
        "servers": [{ "url": base_url }],
        "paths": {
            "/api/health": {
                "get": { "summary": "Health check", "responses": ok("200", "OK") }
            },
            "/api/voices": {
                "get": { "summary": "List installed voices and catalog", "responses": ok("200", "Voice list") }
            },
            "/api/voices/install": {
                "post": {
                    "summary": "Install a voice from the catalog",
                    "requestBody": json_body(json!({ "voice": { "type": "string" } }), &["voice"]),
                    "responses": ok("201", "Installed"),
                }
            },
            "/api/voices/{voice_id}": {
                "delete": {
                    "summary": "Uninstall voice model",
                    "parameters": [path_param("voice_id")],
                    "responses": ok("200", "Uninstalled"),
                }
            },
            "/api/speak": {
                "post": {
                    "summary": "Synthesize speech",
                    "requestBody": json_body(
                        json!({
                            "text": { "type": "string" },
                            "voice": { "type": "string" },
                            "speed": { "type": "number" },
                            "prependSilenceMs": { "type": "integer" },
                        }),
                        &["text"],
                    ),
                    "responses": ok("201", "Audio generated"),
                }
            },
            "/api/audio/{name}": {
                "get": {
                    "summary": "Fetch generated WAV audio",
                    "parameters": [path_param("name")],
                    "responses": ok("200", "WAV audio"),
                }
            },
            "/api/download/{name}": {
                "get": {
                    "summary": "Download generated audio in selected format",
                    "parameters": [
                        path_param("name"),
                        {
                            "name": "format",
                            "in": "query",
                            "required": false,
                            "schema": { "type": "string", "enum": ["wav", "mp3", "ogg"] },
                        }
                    ],
                    "responses": ok("200", "Download file"),
                }
            },
            "/api/settings": {
                "get": { "summary": "Read settings", "responses": ok("200", "Settings") },
                "put": { "summary": "Replace settings", "responses": ok("200", "Normalized settings") }
            },
            "/api/history": {
                "get": { "summary": "Read history", "responses": ok("200", "History") },
                "put": { "summary": "Replace history", "responses": ok("200", "History") },
                "post": {
                    "summary": "Append a history entry",
                    "requestBody": json_body(json!({ "text": { "type": "string" } }), &["text"]),
                    "responses": ok("201", "Entry stored"),
                }
            },
            "/api/openapi.json": {
                "get": { "summary": "OpenAPI document", "responses": ok("200", "OpenAPI spec") }
            },
            "/api/docs": {
                "get": { "summary": "Swagger UI docs", "responses": ok("200", "Swagger UI") }
            },
        },
    })
}

/// Handler for `GET /api/openapi.json`.
pub async fn openapi_handler(headers: HeaderMap) -> Json<Value> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    Json(openapi_document(&format!("http://{host}")))
}

/// Handler for `GET /api/docs`.
pub async fn docs_handler() -> Html<&'static str> {
    Html(DOCS_HTML)
}
