//! In-process [`DocumentStore`] used by tests across the workspace. It
//! enforces the same conflict rules as a real engine and can be told to be
//! unreachable, to deny operations, or to fail them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::ProvisionError;
use crate::plan::{Credential, Grant, PrincipalSpec};
use crate::store::{DocumentStore, PrincipalRecord};

/// Store operations that can be denied or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    FindPrincipal,
    CreatePrincipal,
    UpdatePrincipal,
    DropPrincipal,
    CollectionExists,
    CreateCollection,
    DropCollection,
    CountDocuments,
}

#[derive(Debug, Clone)]
struct StoredPrincipal {
    credential: Credential,
    grants: BTreeSet<Grant>,
}

#[derive(Debug, Default)]
struct MemoryState {
    unreachable: bool,
    principals: BTreeMap<(String, String), StoredPrincipal>,
    collections: BTreeMap<(String, String), u64>,
    denied: BTreeSet<Operation>,
    failing: BTreeMap<Operation, String>,
    stale_lookups: u32,
    writes: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Empty, reachable store with every right granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that fails every command with a connection error.
    pub fn unreachable() -> Self {
        let store = Self::default();
        store.state().unreachable = true;
        store
    }

    /// Make `operation` fail with `PermissionDenied`.
    pub fn deny(&self, operation: Operation) {
        self.state().denied.insert(operation);
    }

    /// Make `operation` fail with an engine error carrying `message`.
    pub fn fail(&self, operation: Operation, message: impl Into<String>) {
        self.state().failing.insert(operation, message.into());
    }

    /// Make the next `find_principal` miss even if the principal exists, as
    /// when another writer creates it between a lookup and the create.
    pub fn miss_next_lookup(&self) {
        self.state().stale_lookups += 1;
    }

    /// Insert a principal directly, bypassing checks.
    pub fn seed_principal(&self, database: &str, principal: &PrincipalSpec) {
        self.state().principals.insert(
            (database.to_string(), principal.name.clone()),
            StoredPrincipal {
                credential: principal.credential.clone(),
                grants: principal.grants.clone(),
            },
        );
    }

    /// Insert a collection holding `documents` documents, bypassing checks.
    pub fn seed_collection(&self, database: &str, collection: &str, documents: u64) {
        self.state()
            .collections
            .insert((database.to_string(), collection.to_string()), documents);
    }

    pub fn principal_count(&self) -> usize {
        self.state().principals.len()
    }

    pub fn collection_count(&self) -> usize {
        self.state().collections.len()
    }

    /// Number of successful mutating commands so far.
    pub fn writes(&self) -> u64 {
        self.state().writes
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock can only come from a test; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn guard(&self, operation: Operation) -> Result<MutexGuard<'_, MemoryState>, ProvisionError> {
        let state = self.state();
        if state.unreachable {
            return Err(ProvisionError::Connection(
                "server selection timed out".to_string(),
            ));
        }
        if state.denied.contains(&operation) {
            return Err(ProvisionError::PermissionDenied(format!(
                "not authorized to run {:?}",
                operation
            )));
        }
        if let Some(message) = state.failing.get(&operation) {
            return Err(ProvisionError::Engine(message.clone()));
        }
        Ok(state)
    }
}

fn key(database: &str, name: &str) -> (String, String) {
    (database.to_string(), name.to_string())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self, _database: &str) -> Result<(), ProvisionError> {
        let state = self.state();
        if state.unreachable {
            return Err(ProvisionError::Connection(
                "server selection timed out".to_string(),
            ));
        }
        Ok(())
    }

    async fn find_principal(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Option<PrincipalRecord>, ProvisionError> {
        let mut state = self.guard(Operation::FindPrincipal)?;
        if state.stale_lookups > 0 {
            state.stale_lookups -= 1;
            return Ok(None);
        }
        Ok(state
            .principals
            .get(&key(database, name))
            .map(|stored| PrincipalRecord {
                name: name.to_string(),
                database: database.to_string(),
                grants: stored.grants.clone(),
                unrecognized_roles: Vec::new(),
            }))
    }

    async fn create_principal(
        &self,
        database: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), ProvisionError> {
        let mut state = self.guard(Operation::CreatePrincipal)?;
        let key = key(database, &principal.name);
        if state.principals.contains_key(&key) {
            return Err(ProvisionError::PrincipalAlreadyExists {
                database: database.to_string(),
                name: principal.name.clone(),
            });
        }
        state.principals.insert(
            key,
            StoredPrincipal {
                credential: principal.credential.clone(),
                grants: principal.grants.clone(),
            },
        );
        state.writes += 1;
        Ok(())
    }

    async fn update_principal(
        &self,
        database: &str,
        principal: &PrincipalSpec,
    ) -> Result<(), ProvisionError> {
        let mut state = self.guard(Operation::UpdatePrincipal)?;
        let stored = state
            .principals
            .get_mut(&key(database, &principal.name))
            .ok_or_else(|| {
                ProvisionError::Engine(format!(
                    "user {}@{} not found",
                    principal.name, database
                ))
            })?;
        stored.credential = principal.credential.clone();
        stored.grants = principal.grants.clone();
        state.writes += 1;
        Ok(())
    }

    async fn drop_principal(&self, database: &str, name: &str) -> Result<(), ProvisionError> {
        let mut state = self.guard(Operation::DropPrincipal)?;
        if state.principals.remove(&key(database, name)).is_none() {
            return Err(ProvisionError::Engine(format!(
                "user {}@{} not found",
                name, database
            )));
        }
        state.writes += 1;
        Ok(())
    }

    async fn authenticate(
        &self,
        database: &str,
        name: &str,
        credential: &Credential,
    ) -> Result<bool, ProvisionError> {
        let state = self.state();
        if state.unreachable {
            return Err(ProvisionError::Connection(
                "server selection timed out".to_string(),
            ));
        }
        Ok(state
            .principals
            .get(&key(database, name))
            .is_some_and(|stored| &stored.credential == credential))
    }

    async fn collection_exists(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<bool, ProvisionError> {
        let state = self.guard(Operation::CollectionExists)?;
        Ok(state.collections.contains_key(&key(database, collection)))
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.guard(Operation::CreateCollection)?;
        let key = key(database, collection);
        if state.collections.contains_key(&key) {
            return Err(ProvisionError::CollectionAlreadyExists {
                database: database.to_string(),
                collection: collection.to_string(),
            });
        }
        state.collections.insert(key, 0);
        state.writes += 1;
        Ok(())
    }

    async fn drop_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.guard(Operation::DropCollection)?;
        state.collections.remove(&key(database, collection));
        state.writes += 1;
        Ok(())
    }

    async fn count_documents(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<u64, ProvisionError> {
        let state = self.guard(Operation::CountDocuments)?;
        // Querying a missing collection yields nothing, as on a real engine.
        Ok(state
            .collections
            .get(&key(database, collection))
            .copied()
            .unwrap_or(0))
    }
}
