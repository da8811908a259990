use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "APICREATOR_ENV";
const CONFIG_DIR_ENV: &str = "APICREATOR_CONFIG_DIR";
const ENV_PREFIX: &str = "APICREATOR";

/// Deployment environment the provisioner is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub provision: ProvisionSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to the `config` directory next to the working directory.
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load `base.toml` and `<environment>.toml` from `config_dir`, then apply
    /// `APICREATOR_*` environment variables on top.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment = Environment::from_str(environment).map_err(|err| anyhow!(err))?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The environment always comes from APICREATOR_ENV, never from files.
        settings.environment = parsed_environment;

        Ok(settings)
    }
}

/// Connection to the document store, as the administrative identity that is
/// allowed to create principals and collections.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Full connection string. When set, `host`/`port` are ignored.
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "DatabaseSettings::default_host")]
    pub host: String,
    #[serde(default = "DatabaseSettings::default_port")]
    pub port: u16,
    #[serde(default = "DatabaseSettings::default_username")]
    pub username: Option<String>,
    #[serde(default = "DatabaseSettings::default_password")]
    pub password: Option<String>,
    #[serde(default = "DatabaseSettings::default_auth_source")]
    pub auth_source: String,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
}

impl DatabaseSettings {
    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        27017
    }

    fn default_username() -> Option<String> {
        Some("root".to_string())
    }

    fn default_password() -> Option<String> {
        Some("example".to_string())
    }

    fn default_auth_source() -> String {
        "admin".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        10_000
    }

    fn default_app_name() -> String {
        "api-creator-init".to_string()
    }

    /// Connection target suitable for logs: no user info, no password.
    pub fn redacted_endpoint(&self) -> String {
        match &self.uri {
            Some(uri) => match (uri.find("://"), uri.rfind('@')) {
                (Some(scheme_end), Some(at)) if at > scheme_end => {
                    format!("{}://{}", &uri[..scheme_end], &uri[at + 1..])
                }
                _ => uri.clone(),
            },
            None => format!("mongodb://{}:{}", self.host, self.port),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: None,
            host: Self::default_host(),
            port: Self::default_port(),
            username: Self::default_username(),
            password: Self::default_password(),
            auth_source: Self::default_auth_source(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            app_name: Self::default_app_name(),
        }
    }
}

/// What the provisioner should do when a principal or collection already exists.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Bring existing objects to the declared state and carry on.
    #[default]
    Reconcile,
    /// Refuse to touch existing objects.
    Fail,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Reconcile => "reconcile",
            ConflictPolicy::Fail => "fail",
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "reconcile" => Ok(ConflictPolicy::Reconcile),
            "fail" => Ok(ConflictPolicy::Fail),
            other => Err(format!(
                "unsupported conflict policy '{}'; expected reconcile/fail",
                other
            )),
        }
    }
}

/// Raw provisioning declaration. Turned into a checked
/// [`ProvisionPlan`](crate::plan::ProvisionPlan) before use.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionSettings {
    #[serde(default = "ProvisionSettings::default_database")]
    pub database: String,
    #[serde(default)]
    pub principal: PrincipalSettings,
    #[serde(default = "ProvisionSettings::default_collection")]
    pub collection: String,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

impl ProvisionSettings {
    fn default_database() -> String {
        "api-creator-documents".to_string()
    }

    fn default_collection() -> String {
        "test".to_string()
    }
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            database: Self::default_database(),
            principal: PrincipalSettings::default(),
            collection: Self::default_collection(),
            on_conflict: ConflictPolicy::default(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct PrincipalSettings {
    #[serde(default = "PrincipalSettings::default_name")]
    pub name: String,
    #[serde(default = "PrincipalSettings::default_credential")]
    pub credential: String,
    #[serde(default = "PrincipalSettings::default_roles")]
    pub roles: Vec<RoleSettings>,
}

impl PrincipalSettings {
    fn default_name() -> String {
        "user".to_string()
    }

    fn default_credential() -> String {
        "password".to_string()
    }

    fn default_roles() -> Vec<RoleSettings> {
        vec![RoleSettings {
            role: "readWrite".to_string(),
            database: None,
        }]
    }
}

impl Default for PrincipalSettings {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            credential: Self::default_credential(),
            roles: Self::default_roles(),
        }
    }
}

impl std::fmt::Debug for PrincipalSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalSettings")
            .field("name", &self.name)
            .field("credential", &"***")
            .field("roles", &self.roles)
            .finish()
    }
}

/// One grant as written in configuration. `database` defaults to the target
/// database of the declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleSettings {
    pub role: String,
    #[serde(default)]
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "unsupported log format '{}'; expected pretty/json",
                other
            )),
        }
    }
}
