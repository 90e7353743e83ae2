#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("unsupported output: {0}")]
    UnsupportedOutput(String),

    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("missing annotation: {0} is not set")]
    MissingAnnotation(&'static str),

    #[error("no claim: {0}")]
    NoClaim(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("channel has no private key to sign with")]
    MissingPrivateKey,

    #[error("block index is already open")]
    AlreadyOpen,

    #[error("block index is not open")]
    NotOpen,

    #[error("worker failure: {0}")]
    Worker(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
