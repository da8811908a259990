//! Mapping of driver failures onto [`ProvisionError`].

use api_creator_kernel::ProvisionError;
use mongodb::error::{Error, ErrorKind};

/// Server error codes the provisioner reacts to.
pub(crate) const UNAUTHORIZED: i32 = 13;
pub(crate) const AUTHENTICATION_FAILED: i32 = 18;
pub(crate) const NAMESPACE_EXISTS: i32 = 48;
pub(crate) const USER_NOT_FOUND: i32 = 11;
pub(crate) const USER_ALREADY_EXISTS: i32 = 51003;

/// Server error code of a command failure, if the error is one.
pub(crate) fn command_code(err: &Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

/// True when the server refused the credential itself.
pub(crate) fn is_authentication_failure(err: &Error) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Authentication { .. })
        || command_code(err) == Some(AUTHENTICATION_FAILED)
}

/// Classify a driver error that has no command-specific meaning.
pub(crate) fn into_provision_error(err: Error) -> ProvisionError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::DnsResolve { .. } => {
            ProvisionError::Connection(err.to_string())
        }
        ErrorKind::Authentication { .. } => ProvisionError::PermissionDenied(err.to_string()),
        ErrorKind::Command(command) => match command.code {
            UNAUTHORIZED | AUTHENTICATION_FAILED => {
                ProvisionError::PermissionDenied(command.message.clone())
            }
            code => ProvisionError::Engine(format!(
                "{} ({}): {}",
                command.code_name, code, command.message
            )),
        },
        _ => ProvisionError::Engine(err.to_string()),
    }
}
