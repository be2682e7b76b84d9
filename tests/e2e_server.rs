//! Server end-to-end tests
//!
//! Runs the real listener on a random port and talks to it over HTTP with
//! reqwest, the way the browser page does.

#![cfg(unix)]

mod common;

use common::{TestHarness, Tools};
use reqwest::multipart::{Form, Part};

#[tokio::test]
async fn healthz_over_http() {
    let (_harness, addr) = TestHarness::with_server(Tools::FfmpegOnly).await;

    let resp = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn browser_style_multipart_upload() {
    let (harness, addr) = TestHarness::with_server(Tools::FfmpegOnly).await;

    let form = Form::new()
        .text("fps", "8")
        .text("colors", "128")
        .text("dither", "floyd_steinberg")
        .part(
            "file",
            Part::bytes(b"movie".to_vec())
                .file_name("my movie.mp4")
                .mime_str("video/mp4")
                .unwrap(),
        );

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/gif");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"my movie.gif\""
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"GIF89a-movie");

    let vf = harness.filter_expression();
    assert!(vf.starts_with("fps=8,"), "{vf}");
    assert!(vf.contains("max_colors=128"));
    assert!(vf.ends_with("dither=floyd_steinberg"));
    assert!(harness.settled_scratch_files().await.is_empty());
}

#[tokio::test]
async fn raw_upload_over_http() {
    let (harness, addr) = TestHarness::with_server(Tools::Both).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert?filename=screen.webm&optimize=yes"))
        .header("content-type", "application/octet-stream")
        .body(vec![b'z'; 4096])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.bytes().await.unwrap();
    assert!(body.starts_with(b"OPT-GIF89a-"));
    assert_eq!(body.len(), "OPT-GIF89a-".len() + 4096);
    assert!(harness.settled_scratch_files().await.is_empty());
}

#[tokio::test]
async fn concurrent_uploads_do_not_collide() {
    let (harness, addr) = TestHarness::with_server(Tools::FfmpegOnly).await;
    let client = reqwest::Client::new();

    let requests = (0..8).map(|i| {
        let client = client.clone();
        let url = format!("http://{addr}/convert?filename=clip{i}.mp4");
        async move {
            let payload = format!("payload-{i}");
            let resp = client
                .post(url)
                .header("content-type", "application/octet-stream")
                .body(payload.clone())
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
            let disposition = resp.headers()["content-disposition"]
                .to_str()
                .unwrap()
                .to_string();
            let body = resp.text().await.unwrap();
            (i, disposition, body, payload)
        }
    });

    for (i, disposition, body, payload) in futures::future::join_all(requests).await {
        assert_eq!(disposition, format!("attachment; filename=\"clip{i}.gif\""));
        assert_eq!(body, format!("GIF89a-{payload}"));
    }
    assert!(harness.settled_scratch_files().await.is_empty());
}

#[tokio::test]
async fn failed_request_does_not_stop_the_listener() {
    let (_harness, addr) = TestHarness::with_server(Tools::FailingFfmpeg(1)).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let resp = client
            .post(format!("http://{addr}/convert"))
            .header("content-type", "application/octet-stream")
            .body("bad input")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
    }

    let resp = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn wrong_content_type_over_http_is_415() {
    let (_harness, addr) = TestHarness::with_server(Tools::FfmpegOnly).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
}
