use thiserror::Error;

/// Everything that can go wrong while attacking an oracle.
#[derive(Debug, Error)]
pub enum Error {
    /// No candidate was accepted (padding oracle) or matched (ECB) at this position. The oracle
    /// does not behave the way the attack assumes, e.g. it is not deterministic.
    #[error("oracle accepted none of the 256 candidates for byte {byte} of block {block}")]
    OracleInconsistency { block: usize, byte: usize },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid PKCS#7 padding")]
    InvalidPadding,

    #[error("oracle output shows no repeated block, it is probably not ECB")]
    NotEcb,

    #[error("gave up after {0} attempts")]
    AttemptsExhausted(usize),

    #[error(transparent)]
    Cipher(#[from] openssl::error::ErrorStack),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn malformed<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::MalformedInput(message.into()))
}
