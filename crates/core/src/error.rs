use crate::store::StoreError;

/// Errors returned by the provisioning and template engines.
///
/// Validation variants are always raised before the first write. Store failures are folded into
/// [`ServiceError::ResourceAlreadyExists`] when the store reports a duplicate key and into
/// [`ServiceError::DatabaseOperationFailed`] otherwise.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Missing Fields or invalid data.")]
    MissingFields(String),
    #[error("Field names must be unique.")]
    DuplicateFieldNames,
    #[error("Names as 'id' and 'name' are reserved.")]
    ReservedFieldNames,
    #[error("startDate should occur before endDate")]
    InvalidDateOrder,
    #[error("Specified type does not exist.")]
    InvalidFieldType(String),
    #[error("Item with that id/name already exists.")]
    ResourceAlreadyExists,
    #[error("Doctor not found.")]
    DoctorNotFound,
    #[error("User not found.")]
    UserNotFound,
    #[error("Template not found.")]
    TemplateNotFound,
    #[error(transparent)]
    InvalidId(#[from] tt_uuid::UuidError),
    #[error("Failed to execute DB operations.")]
    DatabaseOperationFailed(#[source] StoreError),
    #[error("operation failed and compensation also failed: {source}; cleanup={cleanup_error}")]
    CompensationFailed {
        #[source]
        source: Box<ServiceError>,
        cleanup_error: StoreError,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceError {
    /// Short detail for logs; the `Display` text is what callers see.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::MissingFields(detail) | Self::InvalidFieldType(detail) => Some(detail),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        if err.is_duplicate_key() {
            tracing::debug!(error = %err, "store reported duplicate key");
            Self::ResourceAlreadyExists
        } else {
            Self::DatabaseOperationFailed(err)
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
