use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("No image loaded")]
    NoImageLoaded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Too much foreground: {proportion:.3} of the image is dark (limit {limit:.3})")]
    TooMuchForeground { proportion: f64, limit: f64 },

    #[error("Capture cancelled")]
    Cancelled,

    #[error("No root position set")]
    NoRoot,

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Common(#[from] phylo_common::CommonError),
}

impl CaptureError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// True for the cooperative-cancellation outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
