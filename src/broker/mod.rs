//! Broker Module
//!
//! The client-facing side of the log service: a Kafka-style API over partitioned,
//! owner-held logs.
//!
//! ## Core Concepts
//! - **Any Node Entry**: Clients may send any request to any node.
//! - **Owner Routing**: Single-key sends are forwarded to the key's owner; multi-key
//!   requests are split per owner and fanned out concurrently.
//! - **Bounded Waiting**: Every remote call has a retry budget and the whole request a
//!   deadline. Unreachable owners fail only their own keys.
//!
//! ## Submodules
//! - **`protocol`**: Endpoints and the closed set of request/response messages.
//! - **`coordinator`**: Fan-out, local execution and result merging.
//! - **`transport`**: The peer transport trait and its HTTP implementation.
//! - **`handlers`**: Axum handlers and router.
//! - **`error`**: Error taxonomy and its wire codes.

pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod transport;
