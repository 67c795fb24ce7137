//! Declarative network description and emulated-link model
//!
//! Provides the entities of a network (switches, routers, hosts and the links between them), a
//! builder that assembles and validates them, and the lifecycle contract of routers

pub mod builder;
pub mod datapath;
pub mod ip;
pub mod link;
pub mod node;
pub mod route;
pub mod router;
pub mod spec;
