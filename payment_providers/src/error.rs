use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not obtain an access token: {0}")]
    Authentication(String),
    #[error("Webhook signature is invalid: {0}")]
    InvalidSignature(String),
}

impl ProviderApiError {
    /// Whether the provider rejected our credentials, as opposed to failing for some other reason.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication(_) => true,
            Self::QueryError { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
