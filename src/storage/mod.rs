//! Local Storage Module
//!
//! Owns the per-node state of the broker and the rule deciding which node that is.
//!
//! ## Core Concepts
//! - **Partitioning**: `PartitionResolver` maps each key to exactly one owner from the
//!   fixed membership list.
//! - **Logs**: `LocalLogStore` keeps an append-only sequence of values per owned key.
//! - **Commits**: `LocalCommitStore` keeps the last acknowledged consumer offset per key.
//!
//! Both stores are plain in-memory structures. They never talk to the network; anything
//! crossing node boundaries goes through the broker's coordinator.

pub mod commit_store;
pub mod log_store;
pub mod partitioner;
