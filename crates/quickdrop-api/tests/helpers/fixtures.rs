//! Request builders shared by the integration tests.

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use bytes::Bytes;

/// Smallest valid PNG: 1x1 transparent pixel.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub fn file_part(name: &str, data: &[u8]) -> Part {
    Part::bytes(Bytes::copy_from_slice(data))
        .file_name(name.to_string())
        .mime_type("application/octet-stream")
}

/// Build a submission form from optional text and `(name, content)` pairs.
pub fn submission_form(text: Option<&str>, files: &[(&str, &[u8])]) -> MultipartForm {
    let mut form = MultipartForm::new();
    if let Some(text) = text {
        form = form.add_text("text", text.to_string());
    }
    for (name, data) in files {
        form = form.add_part("files", file_part(name, data));
    }
    form
}

pub async fn upload(
    client: &TestServer,
    text: Option<&str>,
    files: &[(&str, &[u8])],
) -> TestResponse {
    client
        .post("/upload")
        .multipart(submission_form(text, files))
        .await
}

/// Upload and return the issued pickup code, asserting success.
pub async fn upload_ok(client: &TestServer, text: Option<&str>, files: &[(&str, &[u8])]) -> String {
    let response = upload(client, text, files).await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: serde_json::Value = response.json();
    body["code"]
        .as_str()
        .expect("code missing from upload response")
        .to_string()
}
