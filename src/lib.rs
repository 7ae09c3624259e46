//! Partitioned Log Library
//!
//! A Kafka-style append-only log service where every node of a fixed cluster owns a
//! share of the keys. The binary (`main.rs`) wires these modules into one node.
//!
//! ## Architecture Modules
//! - **`membership`**: The fixed, ordered list of cluster nodes and the local identity.
//! - **`storage`**: Key ownership (`PartitionResolver`) and the node's in-memory logs and
//!   committed offsets.
//! - **`broker`**: The client API. Routes single-key writes to their owner and fans
//!   multi-key reads and commits out to every owner involved, concurrently.
//! - **`config`**: Command line settings of a node.
//! - **`server`**: Assembles a node and serves it over HTTP.

pub mod broker;
pub mod config;
pub mod membership;
pub mod server;
pub mod storage;
