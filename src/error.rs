use thiserror::Error;

/// Errores que la resolución reporta a quien la invoca.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("The Spotify API key or client secret has not been set properly")]
    AuthConfig,

    #[error("This doesn't seem to be a valid Spotify playlist/album URL or code: {0}")]
    SourceFormat(String),

    #[error("No valid entry found")]
    NoValidEntry,

    #[error("Provider transport failure: {0}")]
    ProviderTransport(#[from] TransportError),

    /// El lote terminó sin producir ningún track y sin filtrar nada.
    #[error("Nothing found for {0}")]
    NothingResolved(String),

    #[error("Cache storage fault: {0}")]
    Storage(#[from] StorageFault),
}

/// Fallos de red de un proveedor externo.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("the connection was reset")]
    ConnectionReset,

    #[error("the request timed out")]
    Timeout,

    /// El proveedor respondió, pero con algo que no se puede interpretar.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() || err.is_request() {
            TransportError::ConnectionReset
        } else if err.is_decode() {
            TransportError::Malformed(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Error de I/O de la caché local. Donde se usa, siempre se sigue sin caché.
#[derive(Debug, Error)]
pub enum StorageFault {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("backend: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
