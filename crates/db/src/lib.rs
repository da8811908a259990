//! MongoDB client factory and [`DocumentStore`](api_creator_kernel::DocumentStore)
//! adapter for the provisioner.

mod errors;
mod store;

use std::time::Duration;

use api_creator_kernel::settings::DatabaseSettings;
use api_creator_kernel::ProvisionError;
use mongodb::options::{ClientOptions, Credential as DriverCredential};
use mongodb::Client;

pub use store::MongoStore;

/// Build driver options from settings.
///
/// A full `uri` wins over `host`/`port`. Credentials from `username`/`password`
/// are applied on top so they never need URL escaping.
pub async fn client_options(settings: &DatabaseSettings) -> Result<ClientOptions, ProvisionError> {
    let uri = settings
        .uri
        .clone()
        .unwrap_or_else(|| format!("mongodb://{}:{}", settings.host, settings.port));

    let mut options = ClientOptions::parse(uri.as_str()).await.map_err(|err| {
        ProvisionError::InvalidInput(vec![format!(
            "invalid connection string {}: {}",
            settings.redacted_endpoint(),
            err
        )])
    })?;

    if let Some(credential) = admin_credential(settings) {
        options.credential = Some(credential);
    }

    let timeout = Duration::from_millis(settings.connect_timeout_ms);
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);
    options.app_name = Some(settings.app_name.clone());

    Ok(options)
}

/// Create a client for the administrative identity. No I/O happens until the
/// first command.
pub async fn connect(settings: &DatabaseSettings) -> Result<Client, ProvisionError> {
    let options = client_options(settings).await?;

    tracing::info!(
        target: "api-creator-db",
        endpoint = %settings.redacted_endpoint(),
        auth_source = %settings.auth_source,
        timeout_ms = settings.connect_timeout_ms,
        "mongodb client configured"
    );

    Client::with_options(options).map_err(errors::into_provision_error)
}

fn admin_credential(settings: &DatabaseSettings) -> Option<DriverCredential> {
    let username = settings.username.as_deref().filter(|name| !name.is_empty())?;

    let mut credential = DriverCredential::default();
    credential.username = Some(username.to_string());
    credential.password = settings.password.clone();
    credential.source = Some(settings.auth_source.clone());
    Some(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn options_follow_settings() {
        let settings = DatabaseSettings::default();
        let options = client_options(&settings).await.unwrap();

        assert_eq!(options.hosts.len(), 1);
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.app_name.as_deref(), Some("api-creator-init"));

        let credential = options.credential.expect("admin credential is set");
        assert_eq!(credential.username.as_deref(), Some("root"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn empty_username_means_no_credential() {
        let settings = DatabaseSettings {
            username: Some(String::new()),
            ..DatabaseSettings::default()
        };
        let options = client_options(&settings).await.unwrap();
        assert!(options.credential.is_none());
    }

    #[tokio::test]
    async fn malformed_uri_is_invalid_input() {
        let settings = DatabaseSettings {
            uri: Some("postgres://localhost".to_string()),
            ..DatabaseSettings::default()
        };
        let err = client_options(&settings).await.unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidInput(_)));
    }
}
