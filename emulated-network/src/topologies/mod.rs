//! Topologies shipped with the crate

pub mod urban_hospital;
