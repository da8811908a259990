use anyhow::Context;
use api_creator_kernel::settings::Settings;

/// Container entrypoint: provision once with the layered settings, then exit.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load provisioning settings")?;
    api_creator_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.redacted_endpoint(),
        target_database = %settings.provision.database,
        "api-creator-init bootstrap starting"
    );

    let report = api_creator_init::provision(&settings)
        .await
        .inspect_err(|err| {
            tracing::error!(error_code = err.code(), error = %err, "api-creator-init bootstrap failed");
        })
        .with_context(|| "provisioning failed")?;

    tracing::info!(
        run_id = %report.run_id,
        noop = report.is_noop(),
        "api-creator-init bootstrap complete"
    );
    Ok(())
}
