//! Runtime support for schemas compiled by `pdl_codegen`: the bitmask wire
//! codec, the process-wide type registry, and a blocking TCP client/server
//! for unary and server-streaming RPCs.

pub mod client;
pub mod framing;
pub mod registry;
pub mod server;
pub mod wire;
