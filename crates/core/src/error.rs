use crate::types::ScanId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: ScanId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
