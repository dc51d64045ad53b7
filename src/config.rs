//! Settings and fixed values of the declared topology.
//!
//! Deployment-specific values come from the environment (a `.env` file is
//! loaded by `main`), everything else is a constant of the topology.

use std::env;

/// Primary address space of the VPC.
pub const VPC_ADDRESS_SPACE: &str = "10.0.0.0/16";
pub const PUBLIC_SUBNET_CIDR: &str = "10.0.1.0/24";
pub const PRIVATE_SUBNET_CIDR: &str = "10.0.2.0/24";
pub const DATA_SUBNET_CIDR: &str = "10.0.3.0/24";
/// Secondary range on the private subnet for pod addressing.
pub const PODS_SECONDARY_CIDR: &str = "10.1.0.0/16";
/// Secondary range on the private subnet for service addressing.
pub const SERVICES_SECONDARY_CIDR: &str = "10.2.0.0/16";

/// Cloud load-balancer health-check origins.
pub const HEALTH_CHECK_RANGES: [&str; 2] = ["130.211.0.0/22", "35.191.0.0/16"];
pub const ANYWHERE: &str = "0.0.0.0/0";

pub const DEFAULT_MTU: u32 = 1460;
/// Priority the provider assigns when a rule does not set one.
pub const DEFAULT_FIREWALL_PRIORITY: u16 = 1000;
/// Lowest precedence a declared rule may take above the implied rules.
pub const DENY_ALL_PRIORITY: u16 = 65534;
/// Priority of the provider's implied ingress-deny / egress-allow rules.
pub const IMPLIED_RULE_PRIORITY: u32 = 65535;
pub const BASTION_TAG: &str = "bastion";
pub const WEB_TAG: &str = "web";
pub const SSH_PORT: u16 = 22;

pub const FLOW_LOG_SAMPLING: f64 = 0.5;

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_ENVIRONMENT: &str = "prod";
pub const DEFAULT_STATE_FILE: &str = "topology_state.json";
pub const DEFAULT_DECLARATION_FILE: &str = "main.tf.json";
pub const GOOGLE_PROVIDER_VERSION: &str = "~> 5.0";

/// Deployment settings for one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// GCP project the topology is declared in.
    pub project_id: String,
    pub region: String,
    /// Prefix of every resource name, e.g. `prod-vpc`.
    pub environment: String,
}

impl Settings {
    pub fn new(project_id: &str, region: &str, environment: &str) -> Settings {
        Settings {
            project_id: project_id.to_string(),
            region: region.to_string(),
            environment: environment.to_string(),
        }
    }

    /// Read settings from `GCP_PROJECT_ID`, `GCP_REGION` and `TOPOLOGY_ENVIRONMENT`.
    pub fn from_env() -> Settings {
        let settings = Settings {
            project_id: env::var("GCP_PROJECT_ID").unwrap_or_default(),
            region: env::var("GCP_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            environment: env::var("TOPOLOGY_ENVIRONMENT")
                .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string()),
        };
        if settings.project_id.is_empty() {
            log::warn!("GCP_PROJECT_ID not set, declaration will leave project_id to the caller");
        }
        log::debug!("settings={:?}", settings);
        settings
    }

    /// Resource name scoped to the environment.
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.environment, suffix)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new("", DEFAULT_REGION, DEFAULT_ENVIRONMENT)
    }
}
