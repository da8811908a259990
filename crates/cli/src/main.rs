use anyhow::{bail, Context};
use api_creator_kernel::settings::{ConflictPolicy, LogFormat, Settings};
use api_creator_kernel::ProvisionPlan;
use clap::{Parser, Subcommand};

/// Operator tooling for the api-creator document store bootstrap.
#[derive(Parser, Debug)]
#[command(name = "api-creator", version, about, long_about = None)]
struct Cli {
    /// Log output format (overrides configuration)
    #[arg(long, global = true, env = "APICREATOR_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the principal and the collection
    Provision {
        /// What to do with objects that already exist (overrides configuration)
        #[arg(long)]
        on_conflict: Option<ConflictPolicy>,
    },
    /// Print the validated declaration without contacting the store
    Plan,
    /// Check the store against the declaration without changing it
    Verify,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load provisioning settings")?;
    if let Some(format) = cli.log_format {
        settings.telemetry.log_format = format;
    }
    api_creator_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Provision { on_conflict } => {
            if let Some(policy) = on_conflict {
                settings.provision.on_conflict = policy;
            }
            let report = api_creator_init::provision(&settings)
                .await
                .inspect_err(|err| {
                    tracing::error!(error_code = err.code(), error = %err, "provisioning failed");
                })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Plan => {
            let plan = ProvisionPlan::from_settings(&settings.provision)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Verify => {
            let verification = api_creator_init::verify(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&verification)?);
            if !verification.is_satisfied() {
                bail!(
                    "store does not match declaration: {}",
                    verification.problems.join("; ")
                );
            }
        }
    }

    Ok(())
}
