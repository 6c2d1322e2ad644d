pub mod compositor;
mod fonts;

use thiserror::Error;

pub use compositor::{compose, decode_image, encode_png};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("font not available: {0}")]
    Font(String),
    #[error("image: {0}")]
    Image(String),
    #[error("internal: {0}")]
    Internal(String),
}
