use api_creator_kernel::{ConflictPolicy, ProvisionError, ProvisionPlan, Step, StepCtx, StepOutcome};
use async_trait::async_trait;

/// Creates the credentialed principal with exactly the declared grants.
pub struct PrincipalStep;

impl PrincipalStep {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Step for PrincipalStep {
    fn name(&self) -> &'static str {
        "principal"
    }

    fn target(&self, plan: &ProvisionPlan) -> String {
        format!("principal {}@{}", plan.principal.name, plan.database)
    }

    async fn apply(&self, ctx: &StepCtx<'_>) -> Result<StepOutcome, ProvisionError> {
        let database = &ctx.plan.database;
        let principal = &ctx.plan.principal;

        let existing = match ctx.store.find_principal(database, &principal.name).await? {
            Some(existing) => {
                if ctx.policy == ConflictPolicy::Fail {
                    return Err(ProvisionError::PrincipalAlreadyExists {
                        database: database.clone(),
                        name: principal.name.clone(),
                    });
                }
                existing
            }
            None => match ctx.store.create_principal(database, principal).await {
                Ok(()) => {
                    tracing::info!(
                        principal = %principal.name,
                        grants = principal.grants.len(),
                        "principal created"
                    );
                    return Ok(StepOutcome::Created);
                }
                // Created by someone else since the lookup.
                Err(ProvisionError::PrincipalAlreadyExists { .. })
                    if ctx.policy == ConflictPolicy::Reconcile =>
                {
                    tracing::warn!(principal = %principal.name, "principal appeared during create");
                    ctx.store
                        .find_principal(database, &principal.name)
                        .await?
                        .ok_or_else(|| {
                            ProvisionError::Engine(format!(
                                "user {}@{} reported as existing but not found",
                                principal.name, database
                            ))
                        })?
                }
                Err(err) => return Err(err),
            },
        };

        let grants_match = existing.has_exact_grants(principal);
        let credential_matches = ctx
            .store
            .authenticate(database, &principal.name, &principal.credential)
            .await?;

        if grants_match && credential_matches {
            return Ok(StepOutcome::Unchanged);
        }

        ctx.store.update_principal(database, principal).await?;
        tracing::info!(
            principal = %principal.name,
            grants_match,
            credential_matches,
            "principal reconciled"
        );
        Ok(StepOutcome::Updated)
    }

    async fn rollback(&self, ctx: &StepCtx<'_>) -> Result<(), ProvisionError> {
        ctx.store
            .drop_principal(&ctx.plan.database, &ctx.plan.principal.name)
            .await
    }
}
