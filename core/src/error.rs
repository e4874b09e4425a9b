use thiserror::Error;

#[derive(Error, Debug)]
pub enum TwinError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Station '{station_id}' not found in registry")]
    StationNotFound { station_id: String },

    #[error("Invalid intervention config: {reason}")]
    InvalidInterventionConfig { reason: String },

    #[error("Invalid config: {reason}")]
    Config { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TwinResult<T> = Result<T, TwinError>;

impl TwinError {
    pub fn invalid_intervention(reason: impl Into<String>) -> Self {
        Self::InvalidInterventionConfig { reason: reason.into() }
    }

    pub fn station_not_found(station_id: impl Into<String>) -> Self {
        Self::StationNotFound { station_id: station_id.into() }
    }
}
