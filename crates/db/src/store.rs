use std::collections::BTreeSet;

use api_creator_kernel::settings::DatabaseSettings;
use api_creator_kernel::{
    Credential, DocumentStore, Grant, PrincipalRecord, PrincipalSpec, ProvisionError, Role,
};
use async_trait::async_trait;
use mongodb::bson::{self, doc, Document};
use mongodb::options::Credential as DriverCredential;
use mongodb::Client;
use serde::Deserialize;

use crate::errors::{
    command_code, into_provision_error, is_authentication_failure, NAMESPACE_EXISTS,
    USER_ALREADY_EXISTS, USER_NOT_FOUND,
};

#[derive(Debug, Deserialize)]
struct UsersInfoReply {
    #[serde(default)]
    users: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: String,
    db: String,
    #[serde(default)]
    roles: Vec<RoleInfo>,
}

#[derive(Debug, Deserialize)]
struct RoleInfo {
    role: String,
    db: String,
}

/// [`DocumentStore`] backed by the official MongoDB driver, acting as the
/// administrative identity from [`DatabaseSettings`].
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    settings: DatabaseSettings,
}

impl MongoStore {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, ProvisionError> {
        let client = crate::connect(settings).await?;
        Ok(Self::from_client(client, settings.clone()))
    }

    pub fn from_client(client: Client, settings: DatabaseSettings) -> Self {
        Self { client, settings }
    }

    async fn command(
        &self,
        database: &str,
        command: Document,
    ) -> Result<Document, mongodb::error::Error> {
        self.client.database(database).run_command(command).await
    }
}

fn roles_document(principal: &PrincipalSpec) -> Vec<Document> {
    principal
        .grants
        .iter()
        .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.database.as_str() })
        .collect()
}

fn into_record(info: UserInfo) -> PrincipalRecord {
    let mut grants = BTreeSet::new();
    let mut unrecognized_roles = Vec::new();

    for entry in info.roles {
        match entry.role.parse::<Role>() {
            Ok(role) => {
                grants.insert(Grant::new(role, entry.db));
            }
            Err(_) => unrecognized_roles.push(format!("{}@{}", entry.role, entry.db)),
        }
    }

    PrincipalRecord {
        name: info.user,
        database: info.db,
        grants,
        unrecognized_roles,
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self, database: &str) -> Result<(), ProvisionError> {
        self.command(database, doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(into_provision_error)
    }

    async fn find_principal(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Option<PrincipalRecord>, ProvisionError> {
        let reply = self
            .command(database, doc! { "usersInfo": { "user": name, "db": database } })
            .await
            .map_err(into_provision_error)?;

        let reply: UsersInfoReply = bson::from_document(reply).map_err(|err| {
            ProvisionError::Engine(format!("unexpected usersInfo reply: {}", err))
        })?;

        Ok(reply.users.into_iter().next().map(into_record))
    }

    async fn create_principal(
        &self,
        database: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), ProvisionError> {
        let command = doc! {
            "createUser": principal.name.as_str(),
            "pwd": principal.credential.expose(),
            "roles": roles_document(principal),
        };

        match self.command(database, command).await {
            Ok(_) => Ok(()),
            Err(err) if command_code(&err) == Some(USER_ALREADY_EXISTS) => {
                Err(ProvisionError::PrincipalAlreadyExists {
                    database: database.to_string(),
                    name: principal.name.clone(),
                })
            }
            Err(err) => Err(into_provision_error(err)),
        }
    }

    async fn update_principal(
        &self,
        database: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), ProvisionError> {
        let command = doc! {
            "updateUser": principal.name.as_str(),
            "pwd": principal.credential.expose(),
            "roles": roles_document(principal),
        };

        self.command(database, command)
            .await
            .map(|_| ())
            .map_err(into_provision_error)
    }

    async fn drop_principal(&self, database: &str, name: &str) -> Result<(), ProvisionError> {
        self.command(database, doc! { "dropUser": name })
            .await
            .map(|_| ())
            .map_err(into_provision_error)
    }

    async fn authenticate(
        &self,
        database: &str,
        name: &str,
        credential: &Credential,
    ) -> Result<bool, ProvisionError> {
        let mut options = crate::client_options(&self.settings).await?;
        let mut principal = DriverCredential::default();
        principal.username = Some(name.to_string());
        principal.password = Some(credential.expose().to_string());
        principal.source = Some(database.to_string());
        options.credential = Some(principal);

        let client = Client::with_options(options).map_err(into_provision_error)?;
        // The handshake authenticates; the command itself needs no privileges.
        let outcome = client
            .database(database)
            .run_command(doc! { "connectionStatus": 1 })
            .await;
        client.shutdown().await;

        match outcome {
            Ok(_) => Ok(true),
            Err(err)
                if is_authentication_failure(&err) || command_code(&err) == Some(USER_NOT_FOUND) =>
            {
                tracing::debug!(
                    target: "api-creator-db",
                    principal = name,
                    error = %err,
                    "authentication rejected"
                );
                Ok(false)
            }
            Err(err) => Err(into_provision_error(err)),
        }
    }

    async fn collection_exists(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<bool, ProvisionError> {
        let names = self
            .client
            .database(database)
            .list_collection_names()
            .filter(doc! { "name": collection })
            .await
            .map_err(into_provision_error)?;

        Ok(names.iter().any(|name| name == collection))
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<(), ProvisionError> {
        match self.client.database(database).create_collection(collection).await {
            Ok(()) => Ok(()),
            Err(err) if command_code(&err) == Some(NAMESPACE_EXISTS) => {
                Err(ProvisionError::CollectionAlreadyExists {
                    database: database.to_string(),
                    collection: collection.to_string(),
                })
            }
            Err(err) => Err(into_provision_error(err)),
        }
    }

    async fn drop_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<(), ProvisionError> {
        self.client
            .database(database)
            .collection::<Document>(collection)
            .drop()
            .await
            .map_err(into_provision_error)
    }

    async fn count_documents(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<u64, ProvisionError> {
        self.client
            .database(database)
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .map_err(into_provision_error)
    }
}
