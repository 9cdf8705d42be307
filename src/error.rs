use thiserror::Error;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Errors surfaced by the ledger gateway and the layers built on it.
///
/// No layer swallows these; the presentation adapter is the only place
/// that turns them into user-facing text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// No ledger-access provider is available in the host environment.
    #[error("no ledger provider available: {0}")]
    NoProvider(String),

    /// The provider returned no usable account, or access was declined.
    #[error("no ledger account available: {0}")]
    AccountUnavailable(String),

    /// The user declined to sign the transaction.
    #[error("transaction rejected: {0}")]
    TransactionRejected(String),

    /// The ledger refused the transaction during validation or execution.
    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    /// A read-only call reverted on the ledger.
    #[error("call reverted: {0}")]
    CallReverted(String),

    /// The transaction was submitted, but its receipt could not be fetched.
    /// The write may already have landed.
    #[error("transaction {tx_hash} submitted but its outcome is unknown: {reason}")]
    ReceiptUnavailable { tx_hash: String, reason: String },

    #[error("shipment {0} not found")]
    NotFound(String),

    /// Local validation failure, raised before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The ledger answered, but not in the expected shape.
    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),

    #[error("ledger transport failure: {0}")]
    Transport(String),
}

impl LedgerError {
    /// Fatal errors end the session; everything else can be retried by the user.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::NoProvider(_) | LedgerError::AccountUnavailable(_)
        )
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        LedgerError::MalformedResponse(message.into())
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument(message.into())
    }
}
