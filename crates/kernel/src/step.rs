use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProvisionError;
use crate::plan::ProvisionPlan;
use crate::settings::ConflictPolicy;
use crate::store::DocumentStore;

/// Context provided to steps while a plan is applied.
pub struct StepCtx<'a> {
    pub plan: &'a ProvisionPlan,
    pub store: &'a dyn DocumentStore,
    pub policy: ConflictPolicy,
}

/// What a step did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// The object did not exist and was created by this run.
    Created,
    /// The object existed and was brought to the declared state.
    Updated,
    /// The object already matched the declaration.
    Unchanged,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Created => "created",
            StepOutcome::Updated => "updated",
            StepOutcome::Unchanged => "unchanged",
        }
    }
}

/// One provisioning step. Steps run strictly in registration order.
#[async_trait]
pub trait Step: Sync + Send {
    /// Unique name for this step
    fn name(&self) -> &'static str;

    /// Human-readable description of the object this step manages
    fn target(&self, plan: &ProvisionPlan) -> String;

    /// Bring the managed object to the declared state
    async fn apply(&self, ctx: &StepCtx<'_>) -> Result<StepOutcome, ProvisionError>;

    /// Undo an `apply` that returned [`StepOutcome::Created`].
    /// Called when a later step of the same run fails.
    async fn rollback(&self, _ctx: &StepCtx<'_>) -> Result<(), ProvisionError> {
        Ok(())
    }
}
