//! Environment data model

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::BOOTSTRAP_ENVIRONMENT_ID;

/// Region used when neither the caller nor `LOGAN_REGION` supplies one
pub const DEFAULT_REGION: &str = "us-ashburn-1";

/// Namespace used when neither the caller nor `LOGAN_NAMESPACE` supplies one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Profile name used for config-file authentication
pub const DEFAULT_CONFIG_PROFILE: &str = "DEFAULT";

/// How the provider client authenticates against an environment
///
/// The registry only stores this reference; resolving credentials is the
/// query client's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Credentials from the local config file, selected by profile
    #[default]
    ConfigFile,
    /// Instance principal of the host the client runs on
    InstancePrincipal,
    /// Resource principal of the function/job the client runs in
    ResourcePrincipal,
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigFile => write!(f, "config_file"),
            Self::InstancePrincipal => write!(f, "instance_principal"),
            Self::ResourcePrincipal => write!(f, "resource_principal"),
        }
    }
}

impl std::str::FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "config_file" | "config" => Ok(Self::ConfigFile),
            "instance_principal" => Ok(Self::InstancePrincipal),
            "resource_principal" => Ok(Self::ResourcePrincipal),
            _ => Err(format!(
                "Unknown auth type: {}. Use: config_file, instance_principal, or resource_principal",
                s
            )),
        }
    }
}

/// One independently addressable backend configuration
///
/// Serialized with camelCase keys so existing environment files
/// (`compartmentId`, `authType`, `configProfile`, ...) load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Unique id, immutable once the environment is registered
    pub id: String,

    /// Display name
    pub name: String,

    /// Provider region, e.g. `eu-frankfurt-1`
    pub region: String,

    /// Compartment/tenant the queries are scoped to
    #[serde(default)]
    pub compartment_id: String,

    /// Service namespace within the tenancy
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Authentication mechanism
    #[serde(default)]
    pub auth_type: AuthType,

    /// Profile name for config-file authentication
    #[serde(default = "default_config_profile")]
    pub config_profile: String,

    /// Whether the environment takes part in multi-environment queries
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Whether this is the default environment
    #[serde(default)]
    pub is_default: bool,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_config_profile() -> String {
    DEFAULT_CONFIG_PROFILE.to_string()
}

fn default_true() -> bool {
    true
}

impl Environment {
    /// Create an active, non-default environment with config-file auth
    pub fn new(id: impl Into<String>, name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            region: region.into(),
            compartment_id: String::new(),
            namespace: default_namespace(),
            auth_type: AuthType::default(),
            config_profile: default_config_profile(),
            is_active: true,
            is_default: false,
        }
    }

    pub fn with_compartment(mut self, compartment_id: impl Into<String>) -> Self {
        self.compartment_id = compartment_id.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_auth(mut self, auth_type: AuthType, config_profile: impl Into<String>) -> Self {
        self.auth_type = auth_type;
        self.config_profile = config_profile.into();
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Build the fallback environment from `LOGAN_*` process variables
    ///
    /// Used when no environments are stored or the store cannot be read.
    pub fn bootstrap() -> Self {
        debug!("Environment::bootstrap: called");
        let region = std::env::var("LOGAN_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
        let compartment_id = std::env::var("LOGAN_COMPARTMENT_ID").unwrap_or_default();
        let namespace = std::env::var("LOGAN_NAMESPACE").unwrap_or_else(|_| default_namespace());

        Self::new(BOOTSTRAP_ENVIRONMENT_ID, "Default Environment", region)
            .with_compartment(compartment_id)
            .with_namespace(namespace)
            .with_default(true)
    }
}

/// Generate an environment id from a display name
///
/// Format: `{6-char-hex}-{slug}`, e.g. `01943a-production-eu`.
pub fn generate_id(name: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.simple().to_string()[..6];
    let slug = slugify(name);
    if slug.is_empty() {
        return hex_prefix.to_string();
    }
    format!("{}-{}", hex_prefix, slug)
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Partial update for an [`Environment`]
///
/// Carries no id: an `id` key in serialized input is ignored, and the
/// default flag is changed only through `set_default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentPatch {
    pub name: Option<String>,
    pub region: Option<String>,
    pub compartment_id: Option<String>,
    pub namespace: Option<String>,
    pub auth_type: Option<AuthType>,
    pub config_profile: Option<String>,
    pub is_active: Option<bool>,
}

impl EnvironmentPatch {
    /// True when applying the patch would change nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every present field to `env`
    pub fn apply(&self, env: &mut Environment) {
        debug!(env_id = %env.id, ?self, "EnvironmentPatch::apply: called");
        if let Some(name) = &self.name {
            env.name = name.clone();
        }
        if let Some(region) = &self.region {
            env.region = region.clone();
        }
        if let Some(compartment_id) = &self.compartment_id {
            env.compartment_id = compartment_id.clone();
        }
        if let Some(namespace) = &self.namespace {
            env.namespace = namespace.clone();
        }
        if let Some(auth_type) = self.auth_type {
            env.auth_type = auth_type;
        }
        if let Some(config_profile) = &self.config_profile {
            env.config_profile = config_profile.clone();
        }
        if let Some(is_active) = self.is_active {
            env.is_active = is_active;
        }
    }
}
