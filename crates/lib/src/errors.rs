use thiserror::Error;

/// Errors raised by the external collaborators the pipeline talks to
/// (AI services, the local database, the vector index).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI API: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI API response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI API returned an error: {0}")]
    AiApi(String),
    #[error("Failed to parse model output: {0}")]
    OutputParse(#[from] serde_json::Error),
    #[error("API key is missing")]
    MissingApiKey,
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),
    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),
    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Record store error: {0}")]
    RecordStore(String),
}
