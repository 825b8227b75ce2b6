use thiserror::Error;

pub type Result<T> = std::result::Result<T, EntityMapError>;

#[derive(Debug, Error)]
pub enum EntityMapError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EntityMapError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        EntityMapError::Configuration(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        EntityMapError::Validation(msg.into())
    }

    pub fn precondition<T: Into<String>>(msg: T) -> Self {
        EntityMapError::Precondition(msg.into())
    }

    pub fn conversion<T: Into<String>>(msg: T) -> Self {
        EntityMapError::Conversion(msg.into())
    }

    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EntityMapError::Driver(Box::new(err))
    }

    /// True for errors raised by the database layer rather than by the mapper.
    pub fn is_driver_error(&self) -> bool {
        matches!(self, EntityMapError::Sqlite(_) | EntityMapError::Driver(_))
    }
}
