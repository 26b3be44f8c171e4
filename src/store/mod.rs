//! Shared compiled-route store
//!
//! The store is the only mutable state shared between the reconciler (single
//! writer per key) and the gateway (many readers). Compiled routes are
//! immutable after publication: updates replace the whole `Arc`, so a
//! snapshot taken mid-update observes either the old or the new route, never
//! a partial one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;

use crate::crd::{ConditionAction, RouteMode};

/// A fully compiled route, produced by the reconciler and read by the gateway
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    /// Route resource name
    pub name: String,
    /// Route resource namespace
    pub namespace: String,
    /// Name of the Ingress this route patches
    pub ingress_name: String,
    /// Resolved namespace of that Ingress
    pub ingress_namespace: String,
    /// Wallet address receiving payments
    pub wallet: String,
    /// Blockchain network identifier
    pub network: String,
    /// Facilitator base URL (resolved, never empty)
    pub facilitator_url: String,
    /// Default price applied to rules without their own
    pub default_price: Option<String>,
    /// Ordered rules; first match wins
    pub rules: Vec<CompiledRule>,
    /// Snapshot of the Ingress backends before patching: path pattern to
    /// absolute backend URL
    pub backends: HashMap<String, String>,
}

/// A single compiled rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Path pattern as declared
    pub path: String,
    /// Effective price (rule price or route default); None only for free rules
    pub price: Option<String>,
    /// Free rules proxy without any payment check
    pub free: bool,
    /// Payment mode
    pub mode: RouteMode,
    /// Pre-compiled header conditions
    pub conditions: Vec<CompiledCondition>,
}

/// A pre-compiled condition; the regex never fails at request time
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    /// Request header to inspect
    pub header: String,
    /// Compiled pattern
    pub pattern: Regex,
    /// Action when the pattern matches
    pub action: ConditionAction,
}

/// Thread-safe in-memory route store shared between controller and gateway
#[derive(Default)]
pub struct RouteStore {
    routes: RwLock<HashMap<(String, String), Arc<CompiledRoute>>>,
}

impl RouteStore {
    /// Create a new empty route store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a compiled route
    pub fn set(&self, namespace: &str, name: &str, route: CompiledRoute) {
        let mut routes = self.routes.write().expect("route store lock poisoned");
        routes.insert((namespace.to_string(), name.to_string()), Arc::new(route));
    }

    /// Remove a route; removing an absent route is a no-op
    pub fn delete(&self, namespace: &str, name: &str) {
        let mut routes = self.routes.write().expect("route store lock poisoned");
        routes.remove(&(namespace.to_string(), name.to_string()));
    }

    /// Point-in-time copy of all routes for iteration without holding the lock
    ///
    /// Iteration order is unspecified; operators must not rely on overlap
    /// between routes.
    pub fn snapshot(&self) -> Vec<Arc<CompiledRoute>> {
        let routes = self.routes.read().expect("route store lock poisoned");
        routes.values().cloned().collect()
    }

    /// Number of live routes
    pub fn count(&self) -> usize {
        let routes = self.routes.read().expect("route store lock poisoned");
        routes.len()
    }
}
