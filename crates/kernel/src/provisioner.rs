use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ProvisionError;
use crate::plan::ProvisionPlan;
use crate::settings::ConflictPolicy;
use crate::step::{Step, StepCtx, StepOutcome};
use crate::store::DocumentStore;

/// Result of one step within a run.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: &'static str,
    pub target: String,
    pub outcome: StepOutcome,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub run_id: Uuid,
    pub database: String,
    pub policy: ConflictPolicy,
    pub steps: Vec<StepReport>,
}

impl ProvisionReport {
    /// True when the run found everything already in the declared state.
    pub fn is_noop(&self) -> bool {
        self.steps
            .iter()
            .all(|report| report.outcome == StepOutcome::Unchanged)
    }
}

/// Ordered list of steps applied against a store, one run at a time.
pub struct Provisioner {
    steps: Vec<Arc<dyn Step>>,
}

impl Provisioner {
    /// Create a provisioner with no steps
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step; steps run in the order they were registered
    pub fn register(&mut self, step: Arc<dyn Step>) {
        self.steps.push(step);
    }

    /// Registered step names, in execution order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Apply every step to `store`.
    ///
    /// The store is pinged first so an unreachable engine fails before any
    /// change. When a step fails, the steps that created something earlier in
    /// this run are rolled back in reverse order.
    pub async fn run(
        &self,
        plan: &ProvisionPlan,
        store: &dyn DocumentStore,
        policy: ConflictPolicy,
    ) -> Result<ProvisionReport, ProvisionError> {
        let run_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "provision",
            run_id = %run_id,
            database = %plan.database,
            policy = policy.as_str()
        );

        async move {
            let ctx = StepCtx {
                plan,
                store,
                policy,
            };

            tracing::info!(steps = ?self.step_names(), "provisioning run starting");

            store.ping(&plan.database).await.inspect_err(|err| {
                tracing::error!(error_code = err.code(), error = %err, "document store unreachable");
            })?;

            let mut applied: Vec<(&Arc<dyn Step>, StepOutcome)> = Vec::new();

            for step in &self.steps {
                let target = step.target(plan);
                match step.apply(&ctx).await {
                    Ok(outcome) => {
                        tracing::info!(
                            step = step.name(),
                            target = %target,
                            outcome = outcome.as_str(),
                            "step applied"
                        );
                        applied.push((step, outcome));
                    }
                    Err(err) => {
                        tracing::error!(
                            step = step.name(),
                            target = %target,
                            error_code = err.code(),
                            error = %err,
                            "step failed"
                        );
                        return Err(Self::unwind(&ctx, &applied, err).await);
                    }
                }
            }

            let report = ProvisionReport {
                run_id,
                database: plan.database.clone(),
                policy,
                steps: applied
                    .iter()
                    .map(|(step, outcome)| StepReport {
                        step: step.name(),
                        target: step.target(plan),
                        outcome: *outcome,
                    })
                    .collect(),
            };

            tracing::info!(noop = report.is_noop(), "provisioning run complete");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Roll back steps that created objects in this run, newest first.
    async fn unwind(
        ctx: &StepCtx<'_>,
        applied: &[(&Arc<dyn Step>, StepOutcome)],
        cause: ProvisionError,
    ) -> ProvisionError {
        let mut left = Vec::new();

        for (step, outcome) in applied.iter().rev() {
            if *outcome != StepOutcome::Created {
                continue;
            }

            let target = step.target(ctx.plan);
            match step.rollback(ctx).await {
                Ok(()) => {
                    tracing::warn!(step = step.name(), target = %target, "step rolled back");
                }
                Err(err) => {
                    tracing::error!(
                        step = step.name(),
                        target = %target,
                        error = %err,
                        "rollback failed"
                    );
                    left.push(target);
                }
            }
        }

        if left.is_empty() {
            cause
        } else {
            ProvisionError::PartiallyApplied {
                left,
                source: Box::new(cause),
            }
        }
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new()
    }
}
