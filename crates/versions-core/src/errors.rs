use thiserror::Error;
use versions_core_types::RecordId;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input
    InvalidInput,
    NotFound,

    // Configuration (raised eagerly at setup or first use)
    InvalidIdentifier,
    MissingColumn,
    /// A mandatory policy override (e.g. `can_destroy`) was not provided
    MissingOverride,

    // Protocol misuse
    NoActiveTransaction,
    TransactionState,

    // Persistence
    ConstraintViolation,
    DestroyRejected,
    /// One or more post-commit actions failed after the commit succeeded
    DeferredActionFailed,
    ChecksumMismatch,
    Persistence,

    // Integration/IO
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::InvalidIdentifier => "ERR_INVALID_IDENTIFIER",
            ExErrorKind::MissingColumn => "ERR_MISSING_COLUMN",
            ExErrorKind::MissingOverride => "ERR_MISSING_OVERRIDE",
            ExErrorKind::NoActiveTransaction => "ERR_NO_ACTIVE_TRANSACTION",
            ExErrorKind::TransactionState => "ERR_TRANSACTION_STATE",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::DestroyRejected => "ERR_DESTROY_REJECTED",
            ExErrorKind::DeferredActionFailed => "ERR_DEFERRED_ACTION_FAILED",
            ExErrorKind::ChecksumMismatch => "ERR_CHECKSUM_MISMATCH",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Configuration errors are never recoverable and fail fast at setup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ExErrorKind::InvalidIdentifier | ExErrorKind::MissingColumn | ExErrorKind::MissingOverride
        )
    }

    /// Programmer errors around the transaction protocol
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            ExErrorKind::NoActiveTransaction | ExErrorKind::TransactionState
        )
    }

    /// Raised after the data was committed; in-memory state must not be
    /// rolled back
    pub fn is_after_commit(&self) -> bool {
        matches!(self, ExErrorKind::DeferredActionFailed)
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus optional
/// context (operation, table, row id) for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    table: Option<String>,
    record_id: Option<RecordId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            table: None,
            record_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add row id context
    pub fn with_record_id(mut self, id: RecordId) -> Self {
        self.record_id = Some(id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the table context, if any
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Get the row id context, if any
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(id) = self.record_id {
            write!(f, " (id: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain failures of the versioning stack
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VersionsError {
    /// A table required by a declaration does not have a column
    #[error("Missing '{column}' field in table {table}")]
    MissingColumn { table: String, column: String },

    /// Table or column name is not a plain SQL identifier
    #[error("Invalid identifier: {name:?}")]
    InvalidIdentifier { name: String },

    /// A version declared destroyable without a `can_destroy` override
    #[error("Define 'can_destroy' in the version policy for table {table}")]
    DestroyPolicyUndefined { table: String },

    /// Deferred action scheduled while no transaction is open
    #[error("'after_commit' should only be used inside a transaction")]
    NoActiveTransaction,

    /// Commit or rollback requested with no transaction open
    #[error("No open transaction to {action}")]
    NoTransactionToEnd { action: String },

    /// Operation needs the connection outside any transaction
    #[error("Cannot {action} while a transaction is open")]
    TransactionOpen { action: String },

    /// Row lookup by id failed
    #[error("Record {id} not found in table {table}")]
    RecordNotFound { table: String, id: RecordId },

    /// Attribute does not exist as a column of the table
    #[error("Unknown attribute '{attribute}' for table {table}")]
    UnknownAttribute { table: String, attribute: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<VersionsError> for ExError {
    fn from(err: VersionsError) -> Self {
        let message = err.to_string();
        match err {
            VersionsError::MissingColumn { table, .. } => ExError::new(ExErrorKind::MissingColumn)
                .with_table(table)
                .with_message(message),

            VersionsError::InvalidIdentifier { .. } => {
                ExError::new(ExErrorKind::InvalidIdentifier).with_message(message)
            }

            VersionsError::DestroyPolicyUndefined { table } => {
                ExError::new(ExErrorKind::MissingOverride)
                    .with_op("can_destroy")
                    .with_table(table)
                    .with_message(message)
            }

            VersionsError::NoActiveTransaction => ExError::new(ExErrorKind::NoActiveTransaction)
                .with_op("after_commit")
                .with_message(message),

            VersionsError::NoTransactionToEnd { action } => {
                ExError::new(ExErrorKind::TransactionState)
                    .with_op(action)
                    .with_message(message)
            }

            VersionsError::TransactionOpen { action } => ExError::new(ExErrorKind::TransactionState)
                .with_op(action)
                .with_message(message),

            VersionsError::RecordNotFound { table, id } => ExError::new(ExErrorKind::NotFound)
                .with_table(table)
                .with_record_id(id)
                .with_message(message),

            VersionsError::UnknownAttribute { table, .. } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_table(table)
                    .with_message(message)
            }

            VersionsError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            VersionsError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for VersionsError {
    fn from(err: serde_json::Error) -> Self {
        VersionsError::Serialization {
            message: err.to_string(),
        }
    }
}
