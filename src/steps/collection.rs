use api_creator_kernel::{ConflictPolicy, ProvisionError, ProvisionPlan, Step, StepCtx, StepOutcome};
use async_trait::async_trait;

/// Ensures the declared collection exists in the target database.
pub struct CollectionStep;

impl CollectionStep {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Step for CollectionStep {
    fn name(&self) -> &'static str {
        "collection"
    }

    fn target(&self, plan: &ProvisionPlan) -> String {
        format!("collection {}.{}", plan.database, plan.collection)
    }

    async fn apply(&self, ctx: &StepCtx<'_>) -> Result<StepOutcome, ProvisionError> {
        let database = &ctx.plan.database;
        let collection = &ctx.plan.collection;

        if ctx.store.collection_exists(database, collection).await? {
            return match ctx.policy {
                ConflictPolicy::Reconcile => Ok(StepOutcome::Unchanged),
                ConflictPolicy::Fail => Err(ProvisionError::CollectionAlreadyExists {
                    database: database.clone(),
                    collection: collection.clone(),
                }),
            };
        }

        match ctx.store.create_collection(database, collection).await {
            Ok(()) => {
                tracing::info!(collection = %collection, "collection created");
                Ok(StepOutcome::Created)
            }
            // Appeared between the existence check and the create.
            Err(ProvisionError::CollectionAlreadyExists { .. })
                if ctx.policy == ConflictPolicy::Reconcile =>
            {
                Ok(StepOutcome::Unchanged)
            }
            Err(err) => Err(err),
        }
    }

    async fn rollback(&self, ctx: &StepCtx<'_>) -> Result<(), ProvisionError> {
        ctx.store
            .drop_collection(&ctx.plan.database, &ctx.plan.collection)
            .await
    }
}
