//! Provisioning properties checked end to end against the in-memory store.

use api_creator_init::{provision_with, verify_with};
use api_creator_kernel::memory::{MemoryStore, Operation};
use api_creator_kernel::settings::ProvisionSettings;
use api_creator_kernel::{
    ConflictPolicy, Credential, DocumentStore, Grant, ProvisionError, ProvisionPlan, Role,
    StepOutcome,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn bootstrap_plan() -> ProvisionPlan {
    ProvisionPlan::from_settings(&ProvisionSettings::default()).expect("default declaration is valid")
}

fn outcomes(report: &api_creator_kernel::ProvisionReport) -> Vec<(&'static str, StepOutcome)> {
    report
        .steps
        .iter()
        .map(|step| (step.step, step.outcome))
        .collect()
}

// =============================================================================
// Fresh store
// =============================================================================

#[tokio::test]
async fn fresh_store_gets_principal_and_empty_collection() {
    let store = MemoryStore::new();
    let plan = bootstrap_plan();

    let report = provision_with(&store, &plan, ConflictPolicy::Reconcile)
        .await
        .unwrap();

    assert_eq!(
        outcomes(&report),
        vec![
            ("principal", StepOutcome::Created),
            ("collection", StepOutcome::Created),
        ]
    );

    let record = store
        .find_principal("api-creator-documents", "user")
        .await
        .unwrap()
        .expect("principal exists");
    assert_eq!(
        record.grants.into_iter().collect::<Vec<_>>(),
        vec![Grant::new(Role::ReadWrite, "api-creator-documents")]
    );
    assert!(store
        .authenticate("api-creator-documents", "user", &Credential::new("password"))
        .await
        .unwrap());
    assert!(store
        .collection_exists("api-creator-documents", "test")
        .await
        .unwrap());
    assert_eq!(
        store
            .count_documents("api-creator-documents", "test")
            .await
            .unwrap(),
        0
    );

    let verification = verify_with(&store, &plan).await.unwrap();
    assert!(verification.is_satisfied(), "{:?}", verification.problems);
}

#[tokio::test]
async fn report_serializes_for_operators() {
    let store = MemoryStore::new();
    let report = provision_with(&store, &bootstrap_plan(), ConflictPolicy::Reconcile)
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["database"], "api-creator-documents");
    assert_eq!(json["policy"], "reconcile");
    assert_eq!(json["steps"][0]["step"], "principal");
    assert_eq!(json["steps"][0]["target"], "principal user@api-creator-documents");
    assert_eq!(json["steps"][1]["outcome"], "created");
}

// =============================================================================
// Re-running
// =============================================================================

#[tokio::test]
async fn rerun_under_reconcile_changes_nothing() {
    let store = MemoryStore::new();
    let plan = bootstrap_plan();

    provision_with(&store, &plan, ConflictPolicy::Reconcile)
        .await
        .unwrap();
    let writes_after_first_run = store.writes();

    let second = provision_with(&store, &plan, ConflictPolicy::Reconcile)
        .await
        .unwrap();

    assert!(second.is_noop());
    assert_eq!(store.writes(), writes_after_first_run);
    assert_eq!(store.principal_count(), 1);
    assert_eq!(store.collection_count(), 1);
    assert!(verify_with(&store, &plan).await.unwrap().is_satisfied());
}

#[tokio::test]
async fn rerun_under_fail_policy_reports_existing_principal() {
    let store = MemoryStore::new();
    let plan = bootstrap_plan();

    provision_with(&store, &plan, ConflictPolicy::Fail)
        .await
        .unwrap();
    let writes_after_first_run = store.writes();

    let err = provision_with(&store, &plan, ConflictPolicy::Fail)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::PrincipalAlreadyExists { ref database, ref name }
            if database == "api-creator-documents" && name == "user"
    ));
    assert_eq!(store.writes(), writes_after_first_run);
    assert!(verify_with(&store, &plan).await.unwrap().is_satisfied());
}

#[tokio::test]
async fn reconcile_restores_a_drifted_principal() {
    let store = MemoryStore::new();
    let plan = bootstrap_plan();
    provision_with(&store, &plan, ConflictPolicy::Reconcile)
        .await
        .unwrap();

    let mut drifted = plan.principal.clone();
    drifted.credential = Credential::new("rotated-by-hand");
    drifted.grants.insert(Grant::new(Role::DbOwner, "api-creator-documents"));
    store
        .update_principal(&plan.database, &drifted)
        .await
        .unwrap();

    let report = provision_with(&store, &plan, ConflictPolicy::Reconcile)
        .await
        .unwrap();

    assert_eq!(
        outcomes(&report),
        vec![
            ("principal", StepOutcome::Updated),
            ("collection", StepOutcome::Unchanged),
        ]
    );
    assert!(verify_with(&store, &plan).await.unwrap().is_satisfied());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn unreachable_engine_is_a_connection_error() {
    let store = MemoryStore::unreachable();

    let err = provision_with(&store, &bootstrap_plan(), ConflictPolicy::Reconcile)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Connection(_)));
    assert_eq!(err.code(), "connection_error");
}

#[tokio::test]
async fn missing_user_admin_rights_create_nothing() {
    let store = MemoryStore::new();
    store.deny(Operation::CreatePrincipal);
    store.deny(Operation::CreateCollection);

    let err = provision_with(&store, &bootstrap_plan(), ConflictPolicy::Reconcile)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PermissionDenied(_)));
    assert_eq!(store.principal_count(), 0);
    assert_eq!(store.collection_count(), 0);
}

#[tokio::test]
async fn denied_collection_rolls_back_the_new_principal() {
    let store = MemoryStore::new();
    store.deny(Operation::CreateCollection);

    let err = provision_with(&store, &bootstrap_plan(), ConflictPolicy::Reconcile)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PermissionDenied(_)));
    assert_eq!(store.principal_count(), 0);
    assert_eq!(store.collection_count(), 0);
}

#[tokio::test]
async fn failed_rollback_surfaces_the_orphaned_principal() {
    let store = MemoryStore::new();
    store.deny(Operation::CreateCollection);
    store.fail(Operation::DropPrincipal, "primary stepped down");

    let err = provision_with(&store, &bootstrap_plan(), ConflictPolicy::Reconcile)
        .await
        .unwrap_err();

    match err {
        ProvisionError::PartiallyApplied { left, source } => {
            assert_eq!(left, vec!["principal user@api-creator-documents".to_string()]);
            assert!(matches!(*source, ProvisionError::PermissionDenied(_)));
        }
        other => panic!("expected PartiallyApplied, got {:?}", other),
    }
    assert_eq!(store.principal_count(), 1);
    assert_eq!(store.collection_count(), 0);
}

#[tokio::test]
async fn pre_existing_principal_is_never_rolled_back() {
    let store = MemoryStore::new();
    let plan = bootstrap_plan();
    store.seed_principal(&plan.database, &plan.principal);
    store.deny(Operation::CreateCollection);

    let err = provision_with(&store, &plan, ConflictPolicy::Reconcile)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PermissionDenied(_)));
    assert_eq!(store.principal_count(), 1);
}
