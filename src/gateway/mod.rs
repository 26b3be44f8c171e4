//! Gateway HTTP server and request pipeline
//!
//! End-user traffic for paid paths lands here after the reconciler rewrites
//! the Ingress. Each request is matched against the compiled routes, then
//! either proxied straight through (free or conditionally free), challenged
//! with a 402, or verified, settled, and proxied with the settlement
//! envelope attached.

mod conditions;
mod handler;
mod proxy;
mod server;

pub use handler::GatewayState;
pub use server::GatewayServer;
