//! poster - Shareable verse posters
//!
//! A background photo, a bottom gradient, the quotation word-wrapped above
//! the reference label, exported as JPEG at the photo's native size.

pub mod compose;
pub mod typeface;
pub mod wrap;

pub use compose::{default_posters, PosterCompositor, PosterSpec};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PosterError {
    #[error("failed to load poster image {url}: {reason}")]
    ImageLoad { url: String, reason: String },
    #[error("failed to load font {path}: {reason}")]
    Font { path: String, reason: String },
    #[error("failed to encode poster: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write poster: {0}")]
    Io(#[from] std::io::Error),
    #[error("poster rendering aborted: {0}")]
    Render(String),
}
