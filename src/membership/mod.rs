//! Cluster Membership Module
//!
//! Holds the fixed, ordered list of nodes that make up the cluster.
//!
//! ## Core Concepts
//! - **Static Topology**: Membership is supplied once at startup and never changes for the
//!   lifetime of the process. Every node is started with the same ordered list.
//! - **Local Identity**: Each node knows which entry of the list it is, which lets the
//!   partitioner and the coordinator tell local work from remote work.
//! - **Addressing**: Every member carries the HTTP address its peers use to reach it.

pub mod service;
pub mod types;
