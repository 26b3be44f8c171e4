//! Kubernetes controller reconciliation logic
//!
//! The reconciler owns route state: it compiles X402Route specs, publishes
//! them to the shared store, and keeps the referenced Ingress objects in
//! sync (patched while the route exists, restored when it is deleted).

mod route;
mod validation;

pub use route::{
    compile_route, collect_paid_paths, error_policy, extract_backends, ingress_to_routes,
    patch_ingress, reconcile, restore_ingress, Context, KubeClient, KubeClientImpl,
};
pub use validation::validate_facilitator_url;
