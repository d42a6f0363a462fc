//! HTTP request handlers for the upload-and-convert service.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /slides` - List converted slides
//! - `GET /slides/{path}` - Converted `.dzi` files and tiles
//! - `POST /upload` - Upload a slide and convert it

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::convert::{convert, TracingObserver};
use crate::dzi::DziWriter;
use crate::error::ConvertError;
use crate::slide::SlideOptions;

/// Multipart field carrying the slide.
pub const UPLOAD_FIELD: &str = "file";

/// Extensions accepted by `POST /upload`, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".svs", ".tiff", ".tif", ".ndpi", ".vms", ".vmu", ".scn"];

const SLIDES_PREFIX: &str = "/slides";

const FORWARDED_PROTO: &str = "x-forwarded-proto";

// =============================================================================
// Application State
// =============================================================================

/// Shared state passed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Converted slides, served under `/slides`
    pub slides_dir: PathBuf,

    /// Staging area for uploads
    pub uploads_dir: PathBuf,

    /// I/O and cache sizing for each conversion
    pub slide_options: SlideOptions,
}

impl AppState {
    /// State rooted at `data_dir`, using `uploads/` and `public/slides/`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            slides_dir: data_dir.join("public").join("slides"),
            uploads_dir: data_dir.join("uploads"),
            slide_options: SlideOptions::default(),
        }
    }

    pub fn with_slide_options(mut self, options: SlideOptions) -> Self {
        self.slide_options = options;
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SlideEntry {
    /// Descriptor file name, including `.dzi`
    pub name: String,

    /// URL the descriptor is served from
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SlidesResponse {
    pub slides: Vec<SlideEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub dzi_url: String,
    pub filename: String,
    pub size: u64,
}

// =============================================================================
// Error Handling
// =============================================================================

/// Failures of `POST /upload`.
#[derive(Debug)]
pub enum UploadError {
    /// No multipart field named `file` with a filename
    NoFile,

    /// Filename extension not in [`ALLOWED_EXTENSIONS`]
    InvalidFileType,

    /// The multipart body could not be read
    Multipart(MultipartError),

    /// Staging the upload on disk failed
    Storage(String),

    /// The staged upload did not convert
    Conversion(ConvertError),
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Multipart(err)
    }
}

impl From<ConvertError> for UploadError {
    fn from(err: ConvertError) -> Self {
        UploadError::Conversion(err)
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            UploadError::NoFile => (StatusCode::BAD_REQUEST, ErrorResponse::new("No file uploaded")),
            UploadError::InvalidFileType => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(format!(
                    "Invalid file type. Allowed: {}",
                    ALLOWED_EXTENSIONS.join(", ")
                )),
            ),
            UploadError::Multipart(err) => (
                err.status(),
                ErrorResponse::with_message("Failed to process file", err.body_text()),
            ),
            UploadError::Storage(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::with_message("Failed to process file", message),
            ),
            UploadError::Conversion(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::with_message("Failed to process file", err.to_string()),
            ),
        };

        // Log based on severity
        if status.is_server_error() {
            error!(status = status.as_u16(), "Upload failed: {:?}", body.message);
        } else {
            debug!(status = status.as_u16(), "Upload rejected: {}", body.error);
        }

        (status, Json(body)).into_response()
    }
}

/// Failure to read the slides directory.
#[derive(Debug)]
pub struct SlidesError(pub std::io::Error);

impl IntoResponse for SlidesError {
    fn into_response(self) -> Response {
        error!("Failed to list slides: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to list slides")),
        )
            .into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "WSI Backend is running".to_string(),
    })
}

/// `GET /slides`
///
/// Lists every `.dzi` in the slides directory, sorted by name. A missing
/// directory lists as empty.
pub async fn slides_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<SlidesResponse>, SlidesError> {
    let mut entries = match tokio::fs::read_dir(&state.slides_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(SlidesResponse { slides: Vec::new() }));
        }
        Err(e) => return Err(SlidesError(e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(SlidesError)? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("dzi") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();

    let base = base_url(&headers, &uri);
    let slides = names
        .into_iter()
        .map(|name| SlideEntry {
            url: format!("{}{}/{}", base, SLIDES_PREFIX, name),
            name,
        })
        .collect();

    Ok(Json(SlidesResponse { slides }))
}

/// `GET /slides/{path}`
///
/// Serves files from the slides directory. Path traversal and missing files
/// are handled by `ServeDir`.
pub async fn slide_file_handler(State(state): State<AppState>, mut request: Request) -> Response {
    let tail = request
        .uri()
        .path()
        .strip_prefix(SLIDES_PREFIX)
        .unwrap_or("/")
        .to_string();
    match Uri::try_from(tail) {
        Ok(uri) => *request.uri_mut() = uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    }

    let mut serve_dir = ServeDir::new(&state.slides_dir);
    match serve_dir.try_call(request).await {
        Ok(response) => response.map(Body::new),
        Err(e) => {
            error!("Failed to serve slide file: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `POST /upload`
///
/// Streams the `file` field to the uploads directory, converts it into
/// `slide_<timestamp>` under the slides directory, then deletes the upload
/// whether or not the conversion succeeded. A request dropped before it
/// finishes also removes its partial output.
pub async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    let timestamp = unix_millis();
    let mut staged = None;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !is_allowed_file(&filename) {
            return Err(UploadError::InvalidFileType);
        }

        tokio::fs::create_dir_all(&state.uploads_dir)
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;
        let upload =
            StagedUpload::new(state.uploads_dir.join(staged_file_name(timestamp, &filename)));

        let mut file = tokio::fs::File::create(upload.path())
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| UploadError::Storage(e.to_string()))?;
            size += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;
        drop(file);

        info!(filename = %filename, size, "File uploaded");
        staged = Some((upload, filename, size));
        break;
    }

    let (mut upload, filename, size) = staged.ok_or(UploadError::NoFile)?;
    let output_name = format!("slide_{}", timestamp);

    upload.converting(&state.slides_dir, &output_name);
    let result = convert(
        upload.path(),
        &state.slides_dir,
        &output_name,
        &state.slide_options,
        &TracingObserver,
    )
    .await;
    upload.conversion_done();
    drop(upload);
    result?;

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded and converted successfully".to_string(),
        dzi_url: format!("{}{}/{}.dzi", base_url(&headers, &uri), SLIDES_PREFIX, output_name),
        filename,
        size,
    }))
}

// =============================================================================
// Staged Uploads
// =============================================================================

/// An upload written to the staging directory.
///
/// Dropping it deletes the file. Between [`converting`](Self::converting)
/// and [`conversion_done`](Self::conversion_done) a drop means the request
/// was cancelled mid-conversion, and the partial pyramid is deleted too.
#[derive(Debug)]
struct StagedUpload {
    path: PathBuf,
    output: Option<DziWriter>,
}

impl StagedUpload {
    fn new(path: PathBuf) -> Self {
        Self { path, output: None }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn converting(&mut self, output_dir: &Path, name: &str) {
        self.output = Some(DziWriter::new(output_dir, name));
    }

    fn conversion_done(&mut self) {
        self.output = None;
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Some(output) = self.output.take() {
            warn!(
                path = %output.dzi_path().display(),
                "Conversion cancelled, removing partial output"
            );
            remove_quietly(&output.files_dir(), |p| std::fs::remove_dir_all(p));
            remove_quietly(&output.dzi_path(), |p| std::fs::remove_file(p));
        }
        remove_quietly(&self.path, |p| std::fs::remove_file(p));
    }
}

/// Tries twice: a tile write still in flight on the blocking pool can land
/// in a directory while it is being removed.
fn remove_quietly(path: &Path, remove: fn(&Path) -> std::io::Result<()>) {
    let result = remove(path).or_else(|_| remove(path));
    match result {
        Ok(()) => debug!(path = %path.display(), "Removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove: {}", e),
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Whether `filename` ends in one of [`ALLOWED_EXTENSIONS`].
pub fn is_allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = format!(".{}", ext.to_ascii_lowercase());
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// `<timestamp>-<name>`, keeping only the final path component of the
/// client's filename and replacing each whitespace run with `_`.
pub fn staged_file_name(timestamp: u128, filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");

    let mut name = String::with_capacity(base.len());
    let mut in_space = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_space {
                name.push('_');
            }
            in_space = true;
        } else {
            name.push(c);
            in_space = false;
        }
    }
    format!("{}-{}", timestamp, name)
}

/// `scheme://host` the client reached us on, or empty (relative URLs) when
/// the request carries no host.
pub fn base_url(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()));
    let Some(host) = host.filter(|h| !h.is_empty()) else {
        return String::new();
    };

    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    format!("{}://{}", scheme, host)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
