//! Read-only check that a store is in the state a plan declares.

use serde::Serialize;

use api_creator_kernel::{DocumentStore, ProvisionError, ProvisionPlan};

/// What `verify` found. `problems` is empty when the store matches the plan.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub database: String,
    pub principal: String,
    pub collection: String,
    pub principal_exists: bool,
    pub grants_match: bool,
    pub authenticates: bool,
    pub collection_exists: bool,
    pub document_count: Option<u64>,
    pub problems: Vec<String>,
}

impl Verification {
    pub fn is_satisfied(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Compare `store` with `plan` without changing anything.
pub async fn verify_with(
    store: &dyn DocumentStore,
    plan: &ProvisionPlan,
) -> Result<Verification, ProvisionError> {
    let database = &plan.database;
    let principal = &plan.principal;
    let mut problems = Vec::new();

    store.ping(database).await?;

    let record = store.find_principal(database, &principal.name).await?;
    let principal_exists = record.is_some();
    let grants_match = match &record {
        Some(record) => {
            let missing: Vec<String> = principal
                .grants
                .difference(&record.grants)
                .map(ToString::to_string)
                .collect();
            let extra: Vec<String> = record
                .grants
                .difference(&principal.grants)
                .map(ToString::to_string)
                .chain(record.unrecognized_roles.iter().cloned())
                .collect();
            if !missing.is_empty() {
                problems.push(format!("principal is missing grants: {}", missing.join(", ")));
            }
            if !extra.is_empty() {
                problems.push(format!("principal holds extra grants: {}", extra.join(", ")));
            }
            missing.is_empty() && extra.is_empty()
        }
        None => {
            problems.push(format!(
                "principal '{}' does not exist on '{}'",
                principal.name, database
            ));
            false
        }
    };

    let authenticates = principal_exists
        && store
            .authenticate(database, &principal.name, &principal.credential)
            .await?;
    if principal_exists && !authenticates {
        problems.push("principal does not authenticate with the declared credential".to_string());
    }

    let collection_exists = store.collection_exists(database, &plan.collection).await?;
    let document_count = if collection_exists {
        Some(store.count_documents(database, &plan.collection).await?)
    } else {
        problems.push(format!(
            "collection '{}' does not exist on '{}'",
            plan.collection, database
        ));
        None
    };

    let verification = Verification {
        database: database.clone(),
        principal: principal.name.clone(),
        collection: plan.collection.clone(),
        principal_exists,
        grants_match,
        authenticates,
        collection_exists,
        document_count,
        problems,
    };

    if verification.is_satisfied() {
        tracing::info!(
            database = %database,
            documents = ?document_count,
            "store matches declaration"
        );
    } else {
        tracing::warn!(
            database = %database,
            problems = ?verification.problems,
            "store does not match declaration"
        );
    }

    Ok(verification)
}
