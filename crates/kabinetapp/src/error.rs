use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum KabinetError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(Uuid),

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Media error: {0}")]
    Media(String),
}

pub type Result<T> = std::result::Result<T, KabinetError>;
