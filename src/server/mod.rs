//! HTTP upload-and-convert service.
//!
//! ```text
//! POST /upload ──▶ uploads/<ts>-<name> ──convert──▶ public/slides/slide_<ts>.dzi
//!                                                    public/slides/slide_<ts>_files/
//! GET  /slides/... ◀──────────── static files ───────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, is_allowed_file, slide_file_handler, slides_handler, upload_handler, AppState,
    ErrorResponse, HealthResponse, SlideEntry, SlidesError, SlidesResponse, UploadError,
    UploadResponse, ALLOWED_EXTENSIONS, UPLOAD_FIELD,
};
pub use routes::{create_router, RouterConfig};
