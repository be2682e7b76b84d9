//! Shared test harness for integration tests.
//!
//! Provides fake `ffmpeg`/`gifsicle` shell scripts and [`TestHarness`],
//! which builds a full [`AppContext`] around them with a private scratch
//! directory. The [`TestHarness::with_server`] constructor starts Axum on a
//! random port for HTTP-level testing.
//!
//! The fake ffmpeg writes `GIF89a-` followed by its input's bytes to its last
//! argument and records its argv in `ffmpeg.args`; the fake gifsicle writes
//! `OPT-` followed by its input to the path after `-o`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use gifify::config::Config;
use gifify::server::{create_router, AppContext};
use gifify_av::{ConversionPipeline, ToolRegistry, FFMPEG, GIFSICLE};
use tempfile::TempDir;

/// Write an executable `sh` script.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}

/// Fake ffmpeg that succeeds.
pub fn fake_ffmpeg(dir: &Path) -> PathBuf {
    let log = dir.join("ffmpeg.args");
    write_script(
        dir,
        "ffmpeg",
        &format!(
            r#"printf '%s\n' "$@" > '{}'
prev=''
for arg in "$@"; do
  if [ "$prev" = '-i' ]; then in="$arg"; fi
  prev="$arg"
  out="$arg"
done
{{ printf 'GIF89a-'; cat "$in"; }} > "$out""#,
            log.display()
        ),
    )
}

/// Fake ffmpeg that rejects its input with the given exit code.
pub fn failing_ffmpeg(dir: &Path, code: i32) -> PathBuf {
    write_script(
        dir,
        "ffmpeg",
        &format!("echo 'fake ffmpeg: Invalid data found when processing input' >&2\nexit {code}"),
    )
}

/// Fake gifsicle that succeeds.
pub fn fake_gifsicle(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "gifsicle",
        r#"prev=''
for arg in "$@"; do
  if [ "$prev" = '-o' ]; then out="$arg"; fi
  if [ "$arg" = '-o' ]; then in="$prev"; fi
  prev="$arg"
done
{ printf 'OPT-'; cat "$in"; } > "$out""#,
    )
}

/// Which fake tools a harness registers.
#[derive(Debug, Clone, Copy)]
pub enum Tools {
    /// Working ffmpeg, no gifsicle.
    FfmpegOnly,
    /// Working ffmpeg and gifsicle.
    Both,
    /// ffmpeg that exits with the given code.
    FailingFfmpeg(i32),
    /// Nothing installed.
    None,
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    tools_dir: TempDir,
    scratch_dir: TempDir,
}

impl TestHarness {
    /// Harness with a working ffmpeg and default configuration.
    pub fn new() -> Self {
        Self::with_tools(Tools::FfmpegOnly)
    }

    pub fn with_tools(tools: Tools) -> Self {
        Self::build(tools, Config::default())
    }

    /// Harness with a custom configuration; the scratch directory is always
    /// replaced by a private one.
    pub fn build(tools: Tools, mut config: Config) -> Self {
        let tools_dir = tempfile::tempdir().expect("failed to create tools dir");
        let scratch_dir = tempfile::tempdir().expect("failed to create scratch dir");
        config.server.scratch_dir = Some(scratch_dir.path().to_path_buf());

        let mut registry = ToolRegistry::default();
        match tools {
            Tools::FfmpegOnly => {
                registry.insert(FFMPEG, fake_ffmpeg(tools_dir.path()), None);
            }
            Tools::Both => {
                registry.insert(FFMPEG, fake_ffmpeg(tools_dir.path()), None);
                registry.insert(GIFSICLE, fake_gifsicle(tools_dir.path()), None);
            }
            Tools::FailingFfmpeg(code) => {
                registry.insert(FFMPEG, failing_ffmpeg(tools_dir.path(), code), None);
            }
            Tools::None => {}
        }

        let pipeline = ConversionPipeline::new(Arc::new(registry));
        let ctx = AppContext::new(config, pipeline).expect("failed to build context");

        Self {
            ctx,
            tools_dir,
            scratch_dir,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server(tools: Tools) -> (Self, SocketAddr) {
        let harness = Self::with_tools(tools);
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Files currently left in the scratch directory.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch_dir.path())
            .expect("failed to list scratch dir")
            .map(|e| e.expect("bad dir entry").path())
            .collect()
    }

    /// Scratch files left once in-flight response bodies have been dropped.
    ///
    /// Over a real socket the client can see the last byte before the
    /// server drops the body stream, so give the server a moment.
    pub async fn settled_scratch_files(&self) -> Vec<PathBuf> {
        for _ in 0..50 {
            let files = self.scratch_files();
            if files.is_empty() {
                return files;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        self.scratch_files()
    }

    /// Arguments of the most recent fake ffmpeg run.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.tools_dir.path().join("ffmpeg.args"))
            .expect("ffmpeg was not run")
            .lines()
            .map(String::from)
            .collect()
    }

    /// The `-vf` expression of the most recent fake ffmpeg run.
    pub fn filter_expression(&self) -> String {
        let args = self.ffmpeg_args();
        let i = args
            .iter()
            .position(|a| a == "-vf")
            .expect("no -vf argument");
        args[i + 1].clone()
    }
}

/// Hand-rolled multipart body for oneshot tests.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "gifify-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, contents: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(contents);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (self.content_type(), self.body)
    }
}
