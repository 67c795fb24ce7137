pub mod network;
pub mod registry;
pub mod topologies;
pub mod verify;

pub use network::builder::{BuildError, HostDecl, TopologyBuilder};
pub use network::link::{LinkConfig, LinkParams, LinkProfile, LinkSpec};
pub use network::node::{NetworkNode, NodeBehavior};
pub use network::router::{LifecycleError, Router};
pub use network::spec::{NodeKind, NodeSpec, Topology};
pub use registry::{TopologyDefinition, TopologyRegistry};
