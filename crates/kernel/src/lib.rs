//! Core types for provisioning the api-creator document store: layered
//! settings, the checked plan, the store and step traits, and the
//! provisioner that applies steps in order.

pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod plan;
pub mod provisioner;
pub mod settings;
pub mod step;
pub mod store;

pub use error::ProvisionError;
pub use plan::{Credential, Grant, PrincipalSpec, ProvisionPlan, Role};
pub use provisioner::{ProvisionReport, Provisioner, StepReport};
pub use settings::{ConflictPolicy, Settings};
pub use step::{Step, StepCtx, StepOutcome};
pub use store::{DocumentStore, PrincipalRecord};
