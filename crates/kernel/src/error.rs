//! Error taxonomy shared by the provisioner, its steps and every store adapter.

use thiserror::Error;

/// Errors that can end a provisioning run.
///
/// None of them are retried. The run stops at the first error and the
/// hosting environment decides whether to halt startup.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The document store could not be reached.
    #[error("cannot reach document store: {0}")]
    Connection(String),

    /// The invoking identity is not allowed to do what the step needs, or
    /// could not authenticate at all.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A principal with this name already exists and the conflict policy
    /// refuses to touch it.
    #[error("principal '{name}' already exists on database '{database}'")]
    PrincipalAlreadyExists { database: String, name: String },

    /// The collection already exists and the conflict policy refuses to
    /// accept it.
    #[error("collection '{collection}' already exists on database '{database}'")]
    CollectionAlreadyExists {
        database: String,
        collection: String,
    },

    /// The declaration was rejected before any I/O took place.
    #[error("invalid provisioning declaration: {}", .0.join("; "))]
    InvalidInput(Vec<String>),

    /// A step failed and undoing the earlier steps of the same run failed as
    /// well. `left` names what is still in the store.
    #[error("provisioning failed and left {} behind: {source}", .left.join(", "))]
    PartiallyApplied {
        left: Vec<String>,
        #[source]
        source: Box<ProvisionError>,
    },

    /// Any other failure reported by the store.
    #[error("document store error: {0}")]
    Engine(String),
}

impl ProvisionError {
    /// Stable machine-readable code, used as a log field.
    pub fn code(&self) -> &'static str {
        match self {
            ProvisionError::Connection(_) => "connection_error",
            ProvisionError::PermissionDenied(_) => "permission_denied",
            ProvisionError::PrincipalAlreadyExists { .. } => "principal_already_exists",
            ProvisionError::CollectionAlreadyExists { .. } => "collection_already_exists",
            ProvisionError::InvalidInput(_) => "invalid_input",
            ProvisionError::PartiallyApplied { .. } => "partially_applied",
            ProvisionError::Engine(_) => "engine_error",
        }
    }
}
