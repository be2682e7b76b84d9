//! `POST /convert`: upload a video, receive a GIF.
//!
//! A request moves through negotiating → receiving → converting →
//! responding. Any step can fail, and failure maps to a status code through
//! [`gifify_core::Error::http_status`]. Both the uploaded input and the
//! produced GIF live in per-request [`TempPath`] guards, so nothing is left
//! in the scratch directory whichever way the request ends.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use futures::{FutureExt, StreamExt};
use gifify_av::PipelineJob;
use gifify_core::{Error, InputSource, OptionLayer, Result};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::error::AppError;
use super::middleware::request_id::RequestId;
use super::AppContext;

/// Upload name assumed for raw bodies without a `filename` query parameter.
pub const DEFAULT_UPLOAD_NAME: &str = "upload.bin";

const FILENAME_PARAM: &str = "filename";
const FILE_FIELD: &str = "file";

pub fn convert_routes() -> Router<AppContext> {
    Router::new().route("/convert", post(convert))
}

/// How the request body is encoded, decided once from `Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEncoding {
    /// `application/octet-stream`: the body is the file.
    RawBinary,
    /// `multipart/form-data`: a `file` part plus option fields.
    MultipartForm,
    /// Anything else, including a missing header.
    Unsupported(String),
}

impl UploadEncoding {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(header::CONTENT_TYPE) else {
            return Self::Unsupported("missing Content-Type".to_string());
        };
        let Ok(value) = value.to_str() else {
            return Self::Unsupported("unreadable Content-Type".to_string());
        };
        let media_type = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            "application/octet-stream" => Self::RawBinary,
            "multipart/form-data" => Self::MultipartForm,
            _ => Self::Unsupported(media_type),
        }
    }
}

/// A received upload, staged on disk.
struct Upload {
    file: TempPath,
    name: String,
    overrides: Option<OptionLayer>,
}

async fn convert(State(ctx): State<AppContext>, request: Request) -> Response {
    let request_id = RequestId::of(&request);
    with_panic_boundary(&request_id, handle_convert(ctx, request)).await
}

/// Run `work` to a response. Errors map through [`AppError`]; a panic
/// becomes a plain 500 and never reaches the listener.
async fn with_panic_boundary<F>(request_id: &str, work: F) -> Response
where
    F: Future<Output = Result<Response>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(response)) => {
            tracing::debug!("done");
            response
        }
        Ok(Err(e)) => AppError::new(e).with_request_id(request_id).into_response(),
        Err(_panic) => {
            tracing::error!(request_id = %request_id, "panic while handling conversion");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "internal error",
            )
                .into_response()
        }
    }
}

async fn handle_convert(ctx: AppContext, request: Request) -> Result<Response> {
    tracing::debug!("negotiating");
    let encoding = UploadEncoding::from_headers(request.headers());
    let base = query_layer(&request);

    let upload = match encoding {
        UploadEncoding::Unsupported(media_type) => {
            return Err(Error::UnsupportedEncoding(media_type));
        }
        UploadEncoding::RawBinary => {
            tracing::debug!("receiving raw body");
            receive_raw(&ctx, request, &base).await?
        }
        UploadEncoding::MultipartForm => {
            tracing::debug!("receiving multipart body");
            receive_multipart(&ctx, request).await?
        }
    };

    let options = ctx
        .resolver
        .resolve(&base, upload.overrides.as_ref())?
        .with_overwrite(true);

    tracing::debug!(upload = %upload.name, "converting");
    let output = ctx.scratch.allocate("gifify_out_", ".gif")?;
    let job = PipelineJob::new(
        InputSource::File(upload.file.to_path_buf()),
        output.to_path_buf(),
        options,
    );
    let outcome = ctx.pipeline.run(&job).await?;
    for warning in &outcome.warnings {
        tracing::warn!("{}", warning);
    }
    drop(upload.file);

    tracing::debug!(optimized = outcome.optimized, "responding");
    respond(output, &upload.name).await
}

fn query_layer(request: &Request) -> OptionLayer {
    match Query::<Vec<(String, String)>>::try_from_uri(request.uri()) {
        Ok(Query(pairs)) => pairs.into_iter().collect(),
        Err(e) => {
            tracing::debug!("ignoring unparsable query string: {}", e);
            OptionLayer::new()
        }
    }
}

/// Declared body length for a raw upload; it must be present and non-zero.
fn declared_length(headers: &HeaderMap) -> Result<u64> {
    let value = headers
        .get(header::CONTENT_LENGTH)
        .ok_or_else(|| Error::Usage("Content-Length is required".to_string()))?;
    let length = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| Error::Usage("Content-Length is not a valid length".to_string()))?;
    if length == 0 {
        return Err(Error::Usage("empty upload".to_string()));
    }
    Ok(length)
}

async fn receive_raw(ctx: &AppContext, request: Request, base: &OptionLayer) -> Result<Upload> {
    let declared = declared_length(request.headers())?;
    let limit = ctx.max_upload_bytes;
    if declared > limit {
        return Err(Error::PayloadTooLarge { limit });
    }

    let name = base
        .get(FILENAME_PARAM)
        .unwrap_or(DEFAULT_UPLOAD_NAME)
        .to_string();
    let file = ctx.scratch.allocate("gifify_in_", &upload_suffix(&name))?;
    let mut sink = tokio::fs::File::create(&file).await?;

    let mut body = request.into_body().into_data_stream();
    let mut remaining = declared;
    while remaining > 0 {
        let Some(chunk) = body.next().await else {
            break;
        };
        let chunk = chunk.map_err(|e| Error::Usage(format!("failed to read request body: {e}")))?;
        // Bytes past the declared length are dropped.
        let take = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        sink.write_all(&chunk[..take]).await?;
        remaining -= take as u64;
    }
    sink.flush().await?;

    if remaining > 0 {
        return Err(Error::Usage(format!(
            "request body ended after {} of {} bytes",
            declared - remaining,
            declared
        )));
    }

    Ok(Upload {
        file,
        name,
        overrides: None,
    })
}

async fn receive_multipart(ctx: &AppContext, request: Request) -> Result<Upload> {
    let limit = ctx.max_upload_bytes;
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| Error::Usage(format!("form parse error: {}", e.body_text())))?;

    let malformed = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::PayloadTooLarge { limit }
        } else {
            Error::Usage(format!("form parse error: {}", e.body_text()))
        }
    };

    let mut overrides = OptionLayer::new();
    let mut staged: Option<(TempPath, String)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };

        if field_name != FILE_FIELD {
            let value = field.text().await.map_err(malformed)?;
            overrides.insert(field_name, value);
            continue;
        }

        let file_name = match field.file_name() {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => continue,
        };
        if staged.is_some() {
            tracing::debug!("ignoring extra file part {:?}", file_name);
            continue;
        }

        let file = ctx.scratch.allocate("gifify_in_", &upload_suffix(&file_name))?;
        let mut sink = tokio::fs::File::create(&file).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            written += chunk.len() as u64;
            if written > limit {
                return Err(Error::PayloadTooLarge { limit });
            }
            sink.write_all(&chunk).await?;
        }
        sink.flush().await?;
        staged = Some((file, file_name));
    }

    let (file, name) = staged.ok_or_else(|| Error::Usage("no file".to_string()))?;
    Ok(Upload {
        file,
        name,
        overrides: Some(overrides),
    })
}

async fn respond(output: TempPath, upload_name: &str) -> Result<Response> {
    let length = tokio::fs::metadata(&output).await?.len();
    let file = tokio::fs::File::open(&output).await?;

    // The guard rides along with the body and unlinks the file once the
    // response has been sent or abandoned.
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _guard = &output;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/gif")
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::CONTENT_DISPOSITION, content_disposition(upload_name))
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}

/// Temp-file suffix for an upload: its extension when it is short and
/// alphanumeric, `.bin` otherwise.
fn upload_suffix(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| ".bin".to_string())
}

/// Stem of the uploaded file's base name.
fn upload_stem(upload_name: &str) -> &str {
    // Browsers may send Windows paths.
    let base = upload_name.rsplit(['/', '\\']).next().unwrap_or_default();
    Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
}

/// `Content-Disposition` file name for an upload: its stem plus `.gif`,
/// reduced to characters that are safe inside a quoted header value.
fn download_name(upload_name: &str) -> String {
    let safe: String = upload_stem(upload_name)
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' && c != ';' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        "output.gif".to_string()
    } else {
        format!("{safe}.gif")
    }
}

/// `Content-Disposition` value for the produced GIF. Names that do not
/// survive the ASCII fallback also get an RFC 5987 `filename*` parameter.
fn content_disposition(upload_name: &str) -> String {
    let fallback = download_name(upload_name);
    let stem: String = upload_stem(upload_name)
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let stem = stem.trim();
    if stem.is_empty() || stem.is_ascii() {
        return format!("attachment; filename=\"{fallback}\"");
    }
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        ext_value_encoded(&format!("{stem}.gif"))
    )
}

/// Percent-encode everything outside the RFC 5987 `attr-char` set.
fn ext_value_encoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for b in s.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => out.push(char::from(b)),
            _ => {
                out.push('%');
                out.push(char::from(HEX[usize::from(b >> 4)]));
                out.push(char::from(HEX[usize::from(b & 0x0f)]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";
