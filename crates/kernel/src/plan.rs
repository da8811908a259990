//! Checked provisioning declaration.
//!
//! Settings are free-form strings; a [`ProvisionPlan`] is what the
//! provisioner actually executes. Building one validates every name before
//! the store is contacted, so a bad declaration never leaves partial state.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::ProvisionError;
use crate::settings::ProvisionSettings;

const MAX_DATABASE_NAME_BYTES: usize = 63;
const DATABASE_NAME_FORBIDDEN: &[char] = &[
    '/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?', '\0',
];

/// Built-in per-database permission levels a principal can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Read,
    ReadWrite,
    DbAdmin,
    UserAdmin,
    DbOwner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Read => "read",
            Role::ReadWrite => "readWrite",
            Role::DbAdmin => "dbAdmin",
            Role::UserAdmin => "userAdmin",
            Role::DbOwner => "dbOwner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Role::Read),
            "readWrite" => Ok(Role::ReadWrite),
            "dbAdmin" => Ok(Role::DbAdmin),
            "userAdmin" => Ok(Role::UserAdmin),
            "dbOwner" => Ok(Role::DbOwner),
            other => Err(format!(
                "unrecognized role '{}'; expected read/readWrite/dbAdmin/userAdmin/dbOwner",
                other
            )),
        }
    }
}

/// A (role, database) pair scoping what a principal may do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Grant {
    pub role: Role,
    pub database: String,
}

impl Grant {
    pub fn new(role: Role, database: impl Into<String>) -> Self {
        Self {
            role,
            database: database.into(),
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.database)
    }
}

/// Secret a principal authenticates with. Never printed or serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The clear-text secret, for handing to the store driver only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

/// Desired state of the provisioned principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalSpec {
    pub name: String,
    pub credential: Credential,
    pub grants: BTreeSet<Grant>,
}

/// Validated declaration the provisioner executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionPlan {
    pub database: String,
    pub principal: PrincipalSpec,
    pub collection: String,
}

impl ProvisionPlan {
    /// Validate `settings` and build a plan, collecting every problem found.
    pub fn from_settings(settings: &ProvisionSettings) -> Result<Self, ProvisionError> {
        let mut problems = Vec::new();

        check_database_name("database name", &settings.database, &mut problems);
        check_principal_name(&settings.principal.name, &mut problems);
        if settings.principal.credential.is_empty() {
            problems.push("credential must not be empty".to_string());
        }
        check_collection_name(&settings.collection, &mut problems);

        let mut grants = BTreeSet::new();
        if settings.principal.roles.is_empty() {
            problems.push("principal must be granted at least one role".to_string());
        }
        for entry in &settings.principal.roles {
            let database = entry
                .database
                .clone()
                .unwrap_or_else(|| settings.database.clone());
            check_database_name("grant database", &database, &mut problems);
            match entry.role.parse::<Role>() {
                Ok(role) => {
                    grants.insert(Grant::new(role, database));
                }
                Err(problem) => problems.push(problem),
            }
        }

        if !problems.is_empty() {
            return Err(ProvisionError::InvalidInput(problems));
        }

        Ok(Self {
            database: settings.database.clone(),
            principal: PrincipalSpec {
                name: settings.principal.name.clone(),
                credential: Credential::new(settings.principal.credential.clone()),
                grants,
            },
            collection: settings.collection.clone(),
        })
    }
}

fn check_database_name(label: &str, name: &str, problems: &mut Vec<String>) {
    if name.is_empty() {
        problems.push(format!("{} must not be empty", label));
        return;
    }
    if name.len() > MAX_DATABASE_NAME_BYTES {
        problems.push(format!(
            "{} '{}' is longer than {} bytes",
            label, name, MAX_DATABASE_NAME_BYTES
        ));
    }
    if let Some(bad) = name.chars().find(|c| DATABASE_NAME_FORBIDDEN.contains(c)) {
        problems.push(format!(
            "{} '{}' contains forbidden character {:?}",
            label, name, bad
        ));
    }
}

fn check_principal_name(name: &str, problems: &mut Vec<String>) {
    if name.is_empty() {
        problems.push("principal name must not be empty".to_string());
        return;
    }
    // Half-width printable ASCII only.
    if !name.chars().all(|c| c.is_ascii_graphic()) {
        problems.push(format!(
            "principal name '{}' must only contain half-width printable characters",
            name.escape_default()
        ));
    }
}

fn check_collection_name(name: &str, problems: &mut Vec<String>) {
    if name.is_empty() {
        problems.push("collection name must not be empty".to_string());
        return;
    }
    if name.contains('$') || name.contains('\0') {
        problems.push(format!(
            "collection name '{}' must not contain '$' or NUL",
            name.escape_default()
        ));
    }
    if name.starts_with("system.") {
        problems.push(format!(
            "collection name '{}' uses the reserved 'system.' prefix",
            name
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{PrincipalSettings, RoleSettings};

    fn problems(settings: &ProvisionSettings) -> Vec<String> {
        match ProvisionPlan::from_settings(settings) {
            Err(ProvisionError::InvalidInput(problems)) => problems,
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn default_settings_build_the_bootstrap_plan() {
        let plan = ProvisionPlan::from_settings(&ProvisionSettings::default()).unwrap();

        assert_eq!(plan.database, "api-creator-documents");
        assert_eq!(plan.principal.name, "user");
        assert_eq!(plan.principal.credential.expose(), "password");
        assert_eq!(
            plan.principal.grants.iter().collect::<Vec<_>>(),
            vec![&Grant::new(Role::ReadWrite, "api-creator-documents")]
        );
        assert_eq!(plan.collection, "test");
    }

    #[test]
    fn plan_json_redacts_the_credential() {
        let plan = ProvisionPlan::from_settings(&ProvisionSettings::default()).unwrap();
        let json = serde_json::to_value(&plan).unwrap();

        assert_eq!(json["principal"]["credential"], "***");
        assert_eq!(json["principal"]["grants"][0]["role"], "readWrite");
        assert_eq!(
            json["principal"]["grants"][0]["database"],
            "api-creator-documents"
        );
        assert!(!json.to_string().contains("password"));
    }

    #[test]
    fn duplicate_grants_collapse() {
        let settings = ProvisionSettings {
            principal: PrincipalSettings {
                roles: vec![
                    RoleSettings {
                        role: "readWrite".to_string(),
                        database: None,
                    },
                    RoleSettings {
                        role: "readWrite".to_string(),
                        database: Some("api-creator-documents".to_string()),
                    },
                ],
                ..PrincipalSettings::default()
            },
            ..ProvisionSettings::default()
        };

        let plan = ProvisionPlan::from_settings(&settings).unwrap();
        assert_eq!(plan.principal.grants.len(), 1);
    }

    #[test]
    fn every_problem_is_reported_at_once() {
        let settings = ProvisionSettings {
            database: String::new(),
            principal: PrincipalSettings {
                name: String::new(),
                credential: String::new(),
                roles: vec![RoleSettings {
                    role: "root".to_string(),
                    database: Some("admin".to_string()),
                }],
            },
            collection: "system.users".to_string(),
            ..ProvisionSettings::default()
        };

        let problems = problems(&settings);
        assert_eq!(problems.len(), 5, "{:?}", problems);
        assert!(problems.iter().any(|p| p == "database name must not be empty"));
        assert!(problems.iter().any(|p| p == "principal name must not be empty"));
        assert!(problems.iter().any(|p| p == "credential must not be empty"));
        assert!(problems.iter().any(|p| p.contains("unrecognized role 'root'")));
        assert!(problems.iter().any(|p| p.contains("'system.' prefix")));
    }

    #[test]
    fn database_names_are_checked_for_forbidden_characters() {
        let settings = ProvisionSettings {
            database: "api.creator".to_string(),
            ..ProvisionSettings::default()
        };
        let problems = problems(&settings);
        // Both the target and the defaulted grant database are rejected.
        assert_eq!(problems.len(), 2, "{:?}", problems);
        assert!(problems[0].contains("forbidden character '.'"));
    }

    #[test]
    fn principal_names_must_be_half_width() {
        let settings = ProvisionSettings {
            principal: PrincipalSettings {
                name: "ユーザー".to_string(),
                ..PrincipalSettings::default()
            },
            ..ProvisionSettings::default()
        };
        let problems = problems(&settings);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("half-width"));
    }

    #[test]
    fn no_roles_is_rejected() {
        let settings = ProvisionSettings {
            principal: PrincipalSettings {
                roles: Vec::new(),
                ..PrincipalSettings::default()
            },
            ..ProvisionSettings::default()
        };
        assert_eq!(
            problems(&settings),
            vec!["principal must be granted at least one role".to_string()]
        );
    }

    #[test]
    fn credential_debug_is_redacted() {
        assert_eq!(format!("{:?}", Credential::new("hunter2")), "Credential(***)");
    }
}
