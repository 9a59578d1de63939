//! # Application Layer Network Protocols
//!
//! Protocols that run on top of the core network traits. Each protocol is
//! connection agnostic: it works with any type implementing
//! [`Connection`](crate::network::Connection), uses fixed-size buffers and
//! never touches the heap.

/// MQTT 3.1.1 packet codec and client session.
///
/// Provides the wire codec for MQTT control packets and a small client
/// session that dispatches published commands to application callbacks.
pub mod mqtt;
