/// Error returned by the feed pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Inbound payload is not valid JSON. Fatal for the pipeline.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("invalid excluded description pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// The item schema has no sku for the given item name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("couldn't price {name}: no sku for this item name")]
pub struct SkuNotFound {
    pub name: String,
}

/// Storage sink failed an insert or delete.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
