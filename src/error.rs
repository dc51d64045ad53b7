//! Static-validity errors of a topology declaration.
//!
//! Policy violations are reported as [`crate::processing::Finding`]s; the
//! errors here are the ones that make a declaration unusable, the kind the
//! provisioning engine rejects at plan time before touching any resource.

use crate::models::ResourceAddress;
use thiserror::Error;

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

#[derive(Error, Debug)]
pub enum TopologyError {
    /// A resource refers to an address that is not declared.
    #[error("{from} references undeclared resource {to}")]
    UnresolvedReference {
        from: ResourceAddress,
        to: ResourceAddress,
    },

    /// Two resources share an address.
    #[error("resource {0} is declared more than once")]
    DuplicateResource(ResourceAddress),

    /// The reference graph is not acyclic.
    #[error("dependency cycle between: {}", format_addresses(.0))]
    DependencyCycle(Vec<ResourceAddress>),

    /// A string that should name a resource could not be parsed.
    #[error("invalid resource address '{0}'")]
    InvalidAddress(String),

    /// A resource could not be flattened into its attribute map.
    #[error("cannot read attributes of {address}: {source}")]
    Attributes {
        address: ResourceAddress,
        #[source]
        source: serde_json::Error,
    },
}

fn format_addresses(addresses: &[ResourceAddress]) -> String {
    addresses
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}
