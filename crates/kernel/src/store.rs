use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::ProvisionError;
use crate::plan::{Credential, Grant, PrincipalSpec};

/// A principal as the store currently knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub name: String,
    pub database: String,
    pub grants: BTreeSet<Grant>,
    /// Roles the store reports that are not one of the known per-database
    /// roles, rendered as `role@database`.
    pub unrecognized_roles: Vec<String>,
}

impl PrincipalRecord {
    /// True when the record holds exactly the grants of `spec` and nothing else.
    pub fn has_exact_grants(&self, spec: &PrincipalSpec) -> bool {
        self.unrecognized_roles.is_empty() && self.grants == spec.grants
    }
}

/// Commands the provisioner needs from a document store.
///
/// Adapters map their native failures onto [`ProvisionError`]; duplicate
/// creation must surface as `PrincipalAlreadyExists` or
/// `CollectionAlreadyExists` so steps can apply the conflict policy.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round-trip to the store, addressing `database`.
    async fn ping(&self, database: &str) -> Result<(), ProvisionError>;

    async fn find_principal(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Option<PrincipalRecord>, ProvisionError>;

    async fn create_principal(
        &self,
        database: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), ProvisionError>;

    /// Replace the credential and the full grant set of an existing principal.
    async fn update_principal(
        &self,
        database: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), ProvisionError>;

    async fn drop_principal(&self, database: &str, name: &str) -> Result<(), ProvisionError>;

    /// `Ok(false)` when the store rejects the credential.
    async fn authenticate(
        &self,
        database: &str,
        name: &str,
        credential: &Credential,
    ) -> Result<bool, ProvisionError>;

    async fn collection_exists(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<bool, ProvisionError>;

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<(), ProvisionError>;

    async fn drop_collection(&self, database: &str, collection: &str)
        -> Result<(), ProvisionError>;

    async fn count_documents(&self, database: &str, collection: &str)
        -> Result<u64, ProvisionError>;
}
