use jsonrpsee::types::error::ErrorObject;
use jsonrpsee::types::ErrorObjectOwned;

/// Satoshi index RPC Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Satoshi index RPC errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed txid argument.
    #[error("invalid txid: {0}")]
    BadTxid(String),
    /// Negative or out-of-range vout argument.
    #[error("invalid vout: {0}")]
    BadVout(i64),
    /// The node runs without the satoshi index.
    #[error("satoshi index is not enabled")]
    IndexDisabled,
    /// Store-level failure, including the missing-mode rejection.
    #[error(transparent)]
    Store(#[from] satindex_store::Error),
    /// The background scan task died.
    #[error("scan task failed")]
    ScanTask,
}

/// Bad argument.
const INVALID_PARAMETER: i32 = -8;
/// Disabled index or a query the retention mode cannot serve.
const METHOD_NOT_FOUND: i32 = -32601;
/// Internal and lookup failures.
const MISC_ERROR: i32 = -5;

impl From<Error> for ErrorObjectOwned {
    fn from(e: Error) -> ErrorObjectOwned {
        let code = match &e {
            Error::BadTxid(_) | Error::BadVout(_) => INVALID_PARAMETER,
            Error::IndexDisabled | Error::Store(satindex_store::Error::ModeRequired) => {
                METHOD_NOT_FOUND
            }
            _ => MISC_ERROR,
        };
        ErrorObject::owned(code, e.to_string(), None::<()>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let object = ErrorObjectOwned::from(Error::BadTxid("xyz".to_string()));
        assert_eq!(object.code(), -8);

        let object = ErrorObjectOwned::from(Error::BadVout(-1));
        assert_eq!(object.code(), -8);

        let object = ErrorObjectOwned::from(Error::IndexDisabled);
        assert_eq!(object.code(), -32601);

        let object = ErrorObjectOwned::from(Error::Store(satindex_store::Error::ModeRequired));
        assert_eq!(object.code(), -32601);

        let object = ErrorObjectOwned::from(Error::Store(satindex_store::Error::Interrupted));
        assert_eq!(object.code(), -5);
    }
}
