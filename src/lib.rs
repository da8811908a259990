//! api-creator-init
//!
//! One-shot provisioning of the api-creator document store: one principal
//! with a scoped grant and one collection in the target database.

pub mod steps;
pub mod verify;

use api_creator_db::MongoStore;
use api_creator_kernel::{
    ConflictPolicy, DocumentStore, ProvisionError, ProvisionPlan, ProvisionReport, Provisioner,
    Settings,
};

pub use verify::{verify_with, Verification};

/// Build the provisioner with the bootstrap steps registered.
pub fn provisioner() -> Provisioner {
    let mut provisioner = Provisioner::new();
    steps::register_all(&mut provisioner);
    provisioner
}

/// Apply `plan` to `store` under `policy`.
pub async fn provision_with(
    store: &dyn DocumentStore,
    plan: &ProvisionPlan,
    policy: ConflictPolicy,
) -> Result<ProvisionReport, ProvisionError> {
    provisioner().run(plan, store, policy).await
}

/// Validate the declaration in `settings` and apply it to the configured
/// MongoDB deployment.
pub async fn provision(settings: &Settings) -> Result<ProvisionReport, ProvisionError> {
    let plan = ProvisionPlan::from_settings(&settings.provision)?;
    let store = MongoStore::connect(&settings.database).await?;
    provision_with(&store, &plan, settings.provision.on_conflict).await
}

/// Check the configured MongoDB deployment against the declaration.
pub async fn verify(settings: &Settings) -> Result<Verification, ProvisionError> {
    let plan = ProvisionPlan::from_settings(&settings.provision)?;
    let store = MongoStore::connect(&settings.database).await?;
    verify_with(&store, &plan).await
}
