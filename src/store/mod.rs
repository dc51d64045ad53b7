//! Files the tool reads and writes.
//!
//! - [`state`] - Recorded state of applied resources
//! - [`topology_file`] - Topology declarations kept as JSON

mod state;
mod topology_file;

pub use state::{read_state, write_state, ResourceState, State};
pub use topology_file::{read_topology, write_topology};
