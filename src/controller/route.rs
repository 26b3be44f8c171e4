//! X402Route controller implementation
//!
//! One reconciliation per route event: extract the original Ingress
//! backends, compile the pricing rules, publish to the route store, ensure
//! the cross-namespace alias service, patch the Ingress so paid paths hit
//! the gateway, and report status. Deletion runs behind a finalizer that
//! restores the Ingress before the route object can go away.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    Ingress, IngressBackend, IngressServiceBackend, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Client, Resource, ResourceExt};
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use super::validation::validate_facilitator_url;
use crate::crd::{Condition, ConditionStatus, X402Route, X402RouteSpec, X402RouteStatus};
use crate::metrics;
use crate::payment;
use crate::store::{CompiledCondition, CompiledRoute, CompiledRule, RouteStore};
use crate::{
    Error, Result, ANNOTATION_MANAGED_BY, ANNOTATION_ORIGINAL_BACKENDS, DEFAULT_FACILITATOR_URL,
    EXTERNAL_SERVICE_NAME, FINALIZER, GATEWAY_PORT, MANAGED_BY_VALUE,
};

/// Field manager used for all writes from this controller
const FIELD_MANAGER: &str = "x402-operator";

/// Trait abstracting Kubernetes client operations for X402Route
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get an Ingress, returning None if it does not exist
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>>;

    /// Persist an updated Ingress
    async fn update_ingress(&self, ingress: &Ingress) -> Result<()>;

    /// Create or update the ExternalName alias Service in the given
    /// namespace, pointing at the operator service DNS name
    async fn ensure_gateway_alias(&self, namespace: &str, operator_target: &str) -> Result<()>;

    /// Delete the alias Service; a missing Service is not an error
    async fn delete_gateway_alias(&self, namespace: &str) -> Result<()>;

    /// List all X402Routes across namespaces
    async fn list_routes(&self) -> Result<Vec<X402Route>>;

    /// Add the operator finalizer to a route
    async fn add_finalizer(&self, namespace: &str, name: &str) -> Result<()>;

    /// Remove the operator finalizer from a route
    async fn remove_finalizer(&self, namespace: &str, name: &str) -> Result<()>;

    /// Patch the status subresource of a route
    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &X402RouteStatus,
    ) -> Result<()>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Get a resource by name, returning None on 404
async fn get_optional<K>(api: &Api<K>, name: &str) -> Result<Option<K>>
where
    K: Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(resource) => Ok(Some(resource)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        get_optional(&api, name).await
    }

    async fn update_ingress(&self, ingress: &Ingress) -> Result<()> {
        let namespace = ingress.namespace().unwrap_or_default();
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&ingress.name_any(), &Default::default(), ingress)
            .await?;
        Ok(())
    }

    async fn ensure_gateway_alias(&self, namespace: &str, operator_target: &str) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        let service = Service {
            metadata: ObjectMeta {
                name: Some(EXTERNAL_SERVICE_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    "app.kubernetes.io/managed-by".to_string(),
                    MANAGED_BY_VALUE.to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("ExternalName".to_string()),
                external_name: Some(operator_target.to_string()),
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port: GATEWAY_PORT,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        // Server-side apply covers both create and update.
        api.patch(
            EXTERNAL_SERVICE_NAME,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&service),
        )
        .await?;

        debug!(namespace, "gateway alias service reconciled");
        Ok(())
    }

    async fn delete_gateway_alias(&self, namespace: &str) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(EXTERNAL_SERVICE_NAME, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_routes(&self) -> Result<Vec<X402Route>> {
        let api: Api<X402Route> = Api::all(self.client.clone());
        Ok(api.list(&Default::default()).await?.items)
    }

    async fn add_finalizer(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<X402Route> = Api::namespaced(self.client.clone(), namespace);
        let Some(route) = get_optional(&api, name).await? else {
            debug!(name, "route not found, skipping finalizer addition");
            return Ok(());
        };

        let mut finalizers = route.metadata.finalizers.unwrap_or_default();
        if finalizers.iter().any(|f| f == FINALIZER) {
            return Ok(());
        }
        finalizers.push(FINALIZER.to_string());

        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn remove_finalizer(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<X402Route> = Api::namespaced(self.client.clone(), namespace);
        let Some(route) = get_optional(&api, name).await? else {
            debug!(name, "route not found, finalizer already removed");
            return Ok(());
        };

        let finalizers: Vec<String> = route
            .metadata
            .finalizers
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f != FINALIZER)
            .collect();

        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &X402RouteStatus,
    ) -> Result<()> {
        let api: Api<X402Route> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

/// Controller context shared across all reconciliation calls
pub struct Context {
    /// Kubernetes client operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Shared route store, also read by the gateway
    pub store: Arc<RouteStore>,
    /// Namespace the operator runs in
    pub operator_namespace: String,
    /// Service name of the operator, exposing the gateway port
    pub operator_service_name: String,
}

impl Context {
    /// Create a new controller context with a real Kubernetes client
    pub fn new(
        client: Client,
        store: Arc<RouteStore>,
        operator_namespace: impl Into<String>,
        operator_service_name: impl Into<String>,
    ) -> Self {
        Self {
            kube: Arc::new(KubeClientImpl::new(client)),
            store,
            operator_namespace: operator_namespace.into(),
            operator_service_name: operator_service_name.into(),
        }
    }

    /// Create a context with a custom client implementation, for tests
    pub fn with_client(
        kube: Arc<dyn KubeClient>,
        store: Arc<RouteStore>,
        operator_namespace: impl Into<String>,
        operator_service_name: impl Into<String>,
    ) -> Self {
        Self {
            kube,
            store,
            operator_namespace: operator_namespace.into(),
            operator_service_name: operator_service_name.into(),
        }
    }

    /// DNS name of the operator service, used as the ExternalName target
    fn operator_target(&self) -> String {
        format!(
            "{}.{}.svc.cluster.local",
            self.operator_service_name, self.operator_namespace
        )
    }
}

/// Reconcile a single X402Route
#[instrument(skip(route, ctx), fields(route = %route.name_any(), namespace = %route.namespace().unwrap_or_default()))]
pub async fn reconcile(route: Arc<X402Route>, ctx: Arc<Context>) -> Result<Action> {
    let name = route.name_any();
    let namespace = route.namespace().unwrap_or_default();
    let has_finalizer = route.finalizers().iter().any(|f| f == FINALIZER);

    // Deletion: restore the Ingress, drop the store entry, then release the
    // finalizer so the object can go away.
    if route.meta().deletion_timestamp.is_some() {
        if has_finalizer {
            cleanup(&route, &ctx, &namespace, &name).await?;
            ctx.kube.remove_finalizer(&namespace, &name).await?;
        }
        return Ok(Action::await_change());
    }

    // The finalizer must be persisted before any side effect; its update
    // event re-enters the loop with a fresh object.
    if !has_finalizer {
        debug!("adding finalizer");
        ctx.kube.add_finalizer(&namespace, &name).await?;
        return Ok(Action::await_change());
    }

    info!("reconciling route");

    let ingress_namespace = route.spec.ingress_namespace(&namespace).to_string();
    let ingress_name = route.spec.ingress_ref.name.clone();
    let generation = route.meta().generation;
    let mut status = route.status.clone().unwrap_or_default();

    // Step 1: fetch the referenced Ingress.
    let Some(mut ingress) = ctx.kube.get_ingress(&ingress_namespace, &ingress_name).await? else {
        warn!(ingress = %ingress_name, "referenced Ingress not found");
        status.ingress_patched = false;
        status.ready = false;
        status.active_routes = 0;
        status.set_condition(
            Condition::new(
                "IngressPatched",
                ConditionStatus::False,
                "IngressNotFound",
                format!("Ingress {ingress_namespace}/{ingress_name} not found"),
            )
            .observed_generation(generation),
        );
        ctx.kube.update_status(&namespace, &name, &status).await?;
        return Err(Error::internal(format!(
            "ingress {ingress_namespace}/{ingress_name} not found"
        )));
    };

    // Step 2: extract original backends and compile the rules. Nothing is
    // published on failure.
    let backends = extract_backends(&ingress);
    let compiled = match compile_route(&route, backends) {
        Ok(compiled) => compiled,
        Err(e) => {
            warn!(error = %e, "failed to compile route");
            status.ingress_patched = false;
            status.ready = false;
            status.active_routes = 0;
            status.set_condition(
                Condition::new("Ready", ConditionStatus::False, "CompileError", e.to_string())
                    .observed_generation(generation),
            );
            ctx.kube.update_status(&namespace, &name, &status).await?;
            // A spec change is required; retrying the same spec cannot help.
            return Ok(Action::await_change());
        }
    };
    let active_routes = compiled.rules.len() as i32;

    // Step 3: publish before patching, so the gateway is never routed
    // traffic it has no compiled rules for.
    ctx.store.set(&namespace, &name, compiled);
    metrics::ROUTE_STORE_UPDATES_TOTAL.inc();
    metrics::ACTIVE_ROUTES.set(ctx.store.count() as i64);

    // Step 4: cross-namespace alias service for the Ingress backend.
    if ingress_namespace != ctx.operator_namespace {
        if let Err(e) = ctx
            .kube
            .ensure_gateway_alias(&ingress_namespace, &ctx.operator_target())
            .await
        {
            error!(error = %e, "failed to reconcile gateway alias service");
            status.ingress_patched = false;
            status.ready = false;
            status.active_routes = active_routes;
            status.set_condition(
                Condition::new(
                    "ExternalServiceReady",
                    ConditionStatus::False,
                    "ServiceError",
                    e.to_string(),
                )
                .observed_generation(generation),
            );
            ctx.kube.update_status(&namespace, &name, &status).await?;
            return Err(e);
        }
        status.set_condition(
            Condition::new(
                "ExternalServiceReady",
                ConditionStatus::True,
                "Reconciled",
                "Gateway alias service is in place",
            )
            .observed_generation(generation),
        );
    }

    // Step 5: patch the Ingress so covered paths resolve to the gateway.
    let gateway_service = if ingress_namespace == ctx.operator_namespace {
        ctx.operator_service_name.clone()
    } else {
        EXTERNAL_SERVICE_NAME.to_string()
    };
    let paid_paths = collect_paid_paths(&route.spec);
    patch_ingress(&mut ingress, &paid_paths, &gateway_service);
    if let Err(e) = ctx.kube.update_ingress(&ingress).await {
        error!(error = %e, "failed to patch Ingress");
        status.ingress_patched = false;
        status.ready = false;
        status.active_routes = active_routes;
        status.set_condition(
            Condition::new(
                "IngressPatched",
                ConditionStatus::False,
                "PatchError",
                e.to_string(),
            )
            .observed_generation(generation),
        );
        ctx.kube.update_status(&namespace, &name, &status).await?;
        return Err(e);
    }

    // Step 6: report status.
    status.ingress_patched = true;
    status.ready = true;
    status.active_routes = active_routes;
    status.set_condition(
        Condition::new(
            "IngressPatched",
            ConditionStatus::True,
            "Reconciled",
            "Ingress patched for payment gating",
        )
        .observed_generation(generation),
    );
    status.set_condition(
        Condition::new(
            "Ready",
            ConditionStatus::True,
            "Reconciled",
            "Route is active and serving traffic",
        )
        .observed_generation(generation),
    );
    ctx.kube.update_status(&namespace, &name, &status).await?;

    info!(
        ingress = %format!("{ingress_namespace}/{ingress_name}"),
        active_routes,
        "reconciliation complete"
    );
    Ok(Action::await_change())
}

/// Finalizer-driven cleanup: restore the Ingress, drop the store entry, and
/// remove the alias service when no other route still needs it.
async fn cleanup(route: &X402Route, ctx: &Context, namespace: &str, name: &str) -> Result<()> {
    let ingress_namespace = route.spec.ingress_namespace(namespace).to_string();

    if let Some(mut ingress) = ctx
        .kube
        .get_ingress(&ingress_namespace, &route.spec.ingress_ref.name)
        .await?
    {
        if restore_ingress(&mut ingress) {
            ctx.kube.update_ingress(&ingress).await?;
            info!(ingress = %ingress.name_any(), "ingress restored");
        }
    }

    ctx.store.delete(namespace, name);
    metrics::ROUTE_STORE_UPDATES_TOTAL.inc();
    metrics::ACTIVE_ROUTES.set(ctx.store.count() as i64);

    if ingress_namespace != ctx.operator_namespace {
        let routes = ctx.kube.list_routes().await?;
        let still_referenced = routes.iter().any(|other| {
            let other_namespace = other.namespace().unwrap_or_default();
            if other.name_any() == name && other_namespace == namespace {
                return false;
            }
            other.spec.ingress_namespace(&other_namespace) == ingress_namespace
        });
        if !still_referenced {
            ctx.kube.delete_gateway_alias(&ingress_namespace).await?;
            info!(namespace = %ingress_namespace, "gateway alias service removed");
        }
    }

    info!("finalizer cleanup complete");
    Ok(())
}

/// Error policy for the controller
///
/// Retryable failures (cluster transients, conflicts) requeue with backoff;
/// spec problems wait for the user to change the spec.
pub fn error_policy(route: Arc<X402Route>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(?error, route = %route.name_any(), "reconciliation failed");
    if error.is_retryable() {
        Action::requeue(Duration::from_secs(5))
    } else {
        Action::await_change()
    }
}

/// Map an Ingress event back to the route(s) that reference it.
///
/// Only Ingresses carrying the managed-by annotation are considered; the
/// compiled routes in the store record their resolved Ingress reference, so
/// no API round-trip is needed here.
pub fn ingress_to_routes(store: &RouteStore, ingress: &Ingress) -> Vec<ObjectRef<X402Route>> {
    let managed = ingress
        .annotations()
        .get(ANNOTATION_MANAGED_BY)
        .is_some_and(|v| v == MANAGED_BY_VALUE);
    if !managed {
        return Vec::new();
    }

    let (Some(ingress_name), Some(ingress_namespace)) =
        (&ingress.metadata.name, &ingress.metadata.namespace)
    else {
        return Vec::new();
    };

    store
        .snapshot()
        .into_iter()
        .filter(|route| {
            route.ingress_name == *ingress_name && route.ingress_namespace == *ingress_namespace
        })
        .map(|route| ObjectRef::new(&route.name).within(&route.namespace))
        .collect()
}

// =============================================================================
// Compilation
// =============================================================================

/// Compile a route spec into its immutable in-memory form.
///
/// Every condition regex is compiled and every effective price is checked
/// against the network's asset decimals here, so nothing can fail at request
/// time. Any error means no partial publish.
pub fn compile_route(route: &X402Route, backends: HashMap<String, String>) -> Result<CompiledRoute> {
    route.spec.validate()?;

    if let Some(url) = route
        .spec
        .payment
        .facilitator_url
        .as_deref()
        .filter(|u| !u.is_empty())
    {
        validate_facilitator_url(url)
            .map_err(|e| Error::compile(format!("facilitatorURL: {e}")))?;
    }

    let namespace = route.namespace().unwrap_or_default();
    let decimals =
        payment::asset_info(payment::chain_id(&route.spec.payment.network)).decimals;

    let mut rules = Vec::with_capacity(route.spec.routes.len());
    for rule in &route.spec.routes {
        let price = if rule.free {
            None
        } else {
            let price = rule
                .price
                .clone()
                .or_else(|| route.spec.payment.default_price.clone())
                .ok_or_else(|| {
                    Error::compile(format!("paid route {:?} has no price", rule.path))
                })?;
            payment::human_to_atomic(&price, decimals)
                .map_err(|e| Error::compile(format!("route {:?}: {e}", rule.path)))?;
            Some(price)
        };

        let mut conditions = Vec::with_capacity(rule.conditions.len());
        for cond in &rule.conditions {
            let pattern = Regex::new(&cond.pattern).map_err(|e| {
                Error::compile(format!("compile condition pattern {:?}: {e}", cond.pattern))
            })?;
            conditions.push(CompiledCondition {
                header: cond.header.clone(),
                pattern,
                action: cond.action,
            });
        }

        rules.push(CompiledRule {
            path: rule.path.clone(),
            price,
            free: rule.free,
            mode: rule.mode,
            conditions,
        });
    }

    Ok(CompiledRoute {
        name: route.name_any(),
        namespace: namespace.clone(),
        ingress_name: route.spec.ingress_ref.name.clone(),
        ingress_namespace: route.spec.ingress_namespace(&namespace).to_string(),
        wallet: route.spec.payment.wallet.clone(),
        network: route.spec.payment.network.clone(),
        facilitator_url: route
            .spec
            .payment
            .facilitator_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string()),
        default_price: route.spec.payment.default_price.clone(),
        rules,
        backends,
    })
}

/// All non-free rule paths; these are the paths the Ingress must route to
/// the gateway.
pub fn collect_paid_paths(spec: &X402RouteSpec) -> Vec<String> {
    spec.routes
        .iter()
        .filter(|rule| !rule.free)
        .map(|rule| rule.path.clone())
        .collect()
}

// =============================================================================
// Ingress backend bookkeeping
// =============================================================================

/// Port of an Ingress service backend: explicit number, or 80 when only a
/// name is given.
fn resolve_backend_port(port: Option<&ServiceBackendPort>) -> i32 {
    if let Some(port) = port {
        if let Some(number) = port.number {
            if number != 0 {
                return number;
            }
        }
        if let Some(name) = &port.name {
            debug!(port_name = %name, "ingress backend uses port name, defaulting to 80");
        }
    }
    80
}

/// Snapshot the live Ingress paths as `path -> "svc:port"`, the annotation
/// value form used for restoration.
fn snapshot_backends(ingress: &Ingress) -> BTreeMap<String, String> {
    let mut backends = BTreeMap::new();
    let Some(rules) = ingress.spec.as_ref().and_then(|s| s.rules.as_ref()) else {
        return backends;
    };
    for rule in rules {
        let Some(http) = &rule.http else { continue };
        for path in &http.paths {
            if let Some(service) = &path.backend.service {
                let port = resolve_backend_port(service.port.as_ref());
                backends.insert(
                    path.path.clone().unwrap_or_default(),
                    format!("{}:{port}", service.name),
                );
            }
        }
    }
    backends
}

/// Parse the original-backends annotation; None when absent or corrupt.
fn stored_backends(ingress: &Ingress) -> Option<BTreeMap<String, String>> {
    let stored = ingress.annotations().get(ANNOTATION_ORIGINAL_BACKENDS)?;
    match serde_json::from_str(stored) {
        Ok(backends) => Some(backends),
        Err(e) => {
            warn!(error = %e, "corrupted original-backends annotation, re-extracting from Ingress rules");
            None
        }
    }
}

/// Resolve the original backend map for a compiled route: the annotation
/// when present (it survives patching), otherwise the live Ingress paths.
/// Values are absolute in-cluster URLs.
pub fn extract_backends(ingress: &Ingress) -> HashMap<String, String> {
    let namespace = ingress.namespace().unwrap_or_default();
    let raw = stored_backends(ingress).unwrap_or_else(|| snapshot_backends(ingress));

    raw.into_iter()
        .filter_map(|(path, svc_port)| {
            let (svc, port) = svc_port.split_once(':')?;
            Some((path, format!("http://{svc}.{namespace}.svc.cluster.local:{port}")))
        })
        .collect()
}

/// Rewrite the Ingress in place: record the original backends (only once),
/// mark the object as managed, and point every path covered by a paid rule
/// at the gateway service. Paths not covered are never touched.
pub fn patch_ingress(ingress: &mut Ingress, paid_paths: &[String], gateway_service: &str) {
    // Snapshot the original backends before the first rewrite. A corrupt
    // annotation is replaced by a fresh snapshot.
    if stored_backends(ingress).is_none() {
        let snapshot = snapshot_backends(ingress);
        let json = serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string());
        ingress
            .annotations_mut()
            .insert(ANNOTATION_ORIGINAL_BACKENDS.to_string(), json);
    }
    ingress
        .annotations_mut()
        .insert(ANNOTATION_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string());

    let Some(rules) = ingress.spec.as_mut().and_then(|s| s.rules.as_mut()) else {
        return;
    };
    for rule in rules {
        let Some(http) = rule.http.as_mut() else { continue };
        for path in &mut http.paths {
            let ingress_path = path.path.as_deref().unwrap_or("");
            let covered = paid_paths
                .iter()
                .any(|paid| crate::matcher::ingress_path_covers_paid_path(ingress_path, paid));
            if covered {
                path.backend = IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: gateway_service.to_string(),
                        port: Some(ServiceBackendPort {
                            number: Some(GATEWAY_PORT),
                            ..Default::default()
                        }),
                    }),
                    resource: None,
                };
            }
        }
    }
}

/// Restore the Ingress from the original-backends annotation and strip both
/// operator annotations. Returns false when there is nothing to persist.
pub fn restore_ingress(ingress: &mut Ingress) -> bool {
    let Some(originals) = stored_backends(ingress) else {
        return false;
    };

    if let Some(rules) = ingress.spec.as_mut().and_then(|s| s.rules.as_mut()) {
        for rule in rules {
            let Some(http) = rule.http.as_mut() else { continue };
            for path in &mut http.paths {
                let key = path.path.clone().unwrap_or_default();
                let Some(original) = originals.get(&key) else {
                    continue;
                };
                let Some((svc, port)) = original.split_once(':') else {
                    continue;
                };
                let port = port.parse::<i32>().unwrap_or(80);
                path.backend = IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: svc.to_string(),
                        port: Some(ServiceBackendPort {
                            number: Some(port),
                            ..Default::default()
                        }),
                    }),
                    resource: None,
                };
            }
        }
    }

    let annotations = ingress.annotations_mut();
    annotations.remove(ANNOTATION_ORIGINAL_BACKENDS);
    annotations.remove(ANNOTATION_MANAGED_BY);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        ConditionAction, IngressReference, PaymentCondition, PaymentDefaults, RouteMode, RouteRule,
    };
    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, IngressRule, IngressSpec,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use std::sync::Mutex;

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn sample_route(name: &str, namespace: &str) -> X402Route {
        let mut route = X402Route::new(
            name,
            X402RouteSpec {
                ingress_ref: IngressReference {
                    name: "web".into(),
                    namespace: None,
                },
                payment: PaymentDefaults {
                    wallet: "0xW".into(),
                    network: "base-sepolia".into(),
                    default_price: Some("0.001".into()),
                    facilitator_url: None,
                },
                routes: vec![
                    RouteRule {
                        path: "/api/*".into(),
                        price: None,
                        free: false,
                        mode: RouteMode::AllPay,
                        conditions: vec![],
                    },
                    RouteRule {
                        path: "/health".into(),
                        price: None,
                        free: true,
                        mode: RouteMode::AllPay,
                        conditions: vec![],
                    },
                ],
            },
        );
        route.metadata.namespace = Some(namespace.to_string());
        route.metadata.generation = Some(1);
        route
    }

    fn route_with_finalizer(name: &str, namespace: &str) -> X402Route {
        let mut route = sample_route(name, namespace);
        route.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
        route
    }

    fn deleted_route(name: &str, namespace: &str) -> X402Route {
        let mut route = route_with_finalizer(name, namespace);
        route.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        route
    }

    fn http_path(path: &str, svc: &str, port: i32) -> HTTPIngressPath {
        HTTPIngressPath {
            path: Some(path.to_string()),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: svc.to_string(),
                    port: Some(ServiceBackendPort {
                        number: Some(port),
                        ..Default::default()
                    }),
                }),
                resource: None,
            },
        }
    }

    fn sample_ingress(namespace: &str) -> Ingress {
        let mut named_port = http_path("/", "web-svc", 0);
        named_port
            .backend
            .service
            .as_mut()
            .unwrap()
            .port = Some(ServiceBackendPort {
            name: Some("http".to_string()),
            number: None,
        });

        Ingress {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some("demo.example.com".to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![http_path("/api", "api-svc", 8080), named_port],
                    }),
                }]),
                ..Default::default()
            }),
            status: None,
        }
    }

    fn backend_service(ingress: &Ingress, path: &str) -> Option<(String, i32)> {
        let rules = ingress.spec.as_ref()?.rules.as_ref()?;
        for rule in rules {
            for p in &rule.http.as_ref()?.paths {
                if p.path.as_deref() == Some(path) {
                    let svc = p.backend.service.as_ref()?;
                    let port = svc.port.as_ref()?.number.unwrap_or(0);
                    return Some((svc.name.clone(), port));
                }
            }
        }
        None
    }

    /// Captured status updates, verified without coupling to mock internals.
    #[derive(Clone, Default)]
    struct StatusCapture {
        updates: Arc<Mutex<Vec<X402RouteStatus>>>,
    }

    impl StatusCapture {
        fn record(&self, status: X402RouteStatus) {
            self.updates.lock().unwrap().push(status);
        }

        fn last(&self) -> Option<X402RouteStatus> {
            self.updates.lock().unwrap().last().cloned()
        }
    }

    fn capture_status(mock: &mut MockKubeClient) -> StatusCapture {
        let capture = StatusCapture::default();
        let recorder = capture.clone();
        mock.expect_update_status().returning(move |_, _, status| {
            recorder.record(status.clone());
            Ok(())
        });
        capture
    }

    fn test_context(mock: MockKubeClient) -> (Arc<Context>, Arc<RouteStore>) {
        let store = Arc::new(RouteStore::new());
        let ctx = Arc::new(Context::with_client(
            Arc::new(mock),
            Arc::clone(&store),
            "x402-system",
            "x402-operator",
        ));
        (ctx, store)
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    mod compilation {
        use super::*;

        #[test]
        fn test_effective_price_resolution() {
            let mut route = sample_route("api", "demo");
            route.spec.routes[0].price = Some("0.05".into());
            let compiled = compile_route(&route, HashMap::new()).unwrap();
            assert_eq!(compiled.rules[0].price.as_deref(), Some("0.05"));

            let route = sample_route("api", "demo");
            let compiled = compile_route(&route, HashMap::new()).unwrap();
            // Falls back to the route default.
            assert_eq!(compiled.rules[0].price.as_deref(), Some("0.001"));
            // Free rules carry no price.
            assert!(compiled.rules[1].price.is_none());
        }

        #[test]
        fn test_facilitator_url_defaults() {
            let route = sample_route("api", "demo");
            let compiled = compile_route(&route, HashMap::new()).unwrap();
            assert_eq!(compiled.facilitator_url, DEFAULT_FACILITATOR_URL);

            let mut route = sample_route("api", "demo");
            route.spec.payment.facilitator_url = Some("http://mock-facilitator:8403".into());
            let compiled = compile_route(&route, HashMap::new()).unwrap();
            assert_eq!(compiled.facilitator_url, "http://mock-facilitator:8403");
        }

        #[test]
        fn test_disallowed_facilitator_url_fails_compilation() {
            let mut route = sample_route("api", "demo");
            route.spec.payment.facilitator_url = Some("http://169.254.169.254/latest".into());
            let err = compile_route(&route, HashMap::new()).unwrap_err();
            assert!(!err.is_retryable());
            assert!(err.to_string().contains("facilitatorURL"));
        }

        #[test]
        fn test_invalid_condition_regex_fails_compilation() {
            let mut route = sample_route("api", "demo");
            route.spec.routes[0].mode = RouteMode::Conditional;
            route.spec.routes[0].conditions = vec![PaymentCondition {
                header: "X".into(),
                pattern: "(".into(),
                action: ConditionAction::Pay,
            }];
            let err = compile_route(&route, HashMap::new()).unwrap_err();
            assert!(err.to_string().contains("compile condition pattern"));
        }

        #[test]
        fn test_excess_precision_price_fails_compilation() {
            let mut route = sample_route("api", "demo");
            route.spec.payment.default_price = Some("0.0000001".into());
            let err = compile_route(&route, HashMap::new()).unwrap_err();
            assert!(err.to_string().contains("decimal places"));
        }

        #[test]
        fn test_compiled_route_records_resolved_ingress_ref() {
            let mut route = sample_route("api", "demo");
            route.spec.ingress_ref.namespace = Some("edge".into());
            let compiled = compile_route(&route, HashMap::new()).unwrap();
            assert_eq!(compiled.ingress_name, "web");
            assert_eq!(compiled.ingress_namespace, "edge");
            assert_eq!(compiled.namespace, "demo");
        }

        #[test]
        fn test_collect_paid_paths_skips_free_rules() {
            let route = sample_route("api", "demo");
            assert_eq!(collect_paid_paths(&route.spec), vec!["/api/*".to_string()]);
        }
    }

    // =========================================================================
    // Ingress backend bookkeeping
    // =========================================================================

    mod backends {
        use super::*;

        #[test]
        fn test_snapshot_reads_paths_and_defaults_named_ports() {
            let snapshot = snapshot_backends(&sample_ingress("demo"));
            assert_eq!(snapshot.get("/api").unwrap(), "api-svc:8080");
            // Named port falls back to 80.
            assert_eq!(snapshot.get("/").unwrap(), "web-svc:80");
        }

        #[test]
        fn test_extract_builds_cluster_local_urls() {
            let backends = extract_backends(&sample_ingress("demo"));
            assert_eq!(
                backends.get("/api").unwrap(),
                "http://api-svc.demo.svc.cluster.local:8080"
            );
            assert_eq!(
                backends.get("/").unwrap(),
                "http://web-svc.demo.svc.cluster.local:80"
            );
        }

        #[test]
        fn test_extract_prefers_the_annotation_snapshot() {
            let mut ingress = sample_ingress("demo");
            // Simulate an already-patched ingress: paths now point at the
            // gateway, but the annotation holds the originals.
            patch_ingress(&mut ingress, &["/api/*".to_string()], "x402-gateway-proxy");
            assert_eq!(
                backend_service(&ingress, "/api").unwrap().0,
                "x402-gateway-proxy"
            );

            let backends = extract_backends(&ingress);
            assert_eq!(
                backends.get("/api").unwrap(),
                "http://api-svc.demo.svc.cluster.local:8080"
            );
        }

        #[test]
        fn test_corrupt_annotation_falls_back_to_live_paths() {
            let mut ingress = sample_ingress("demo");
            ingress.annotations_mut().insert(
                ANNOTATION_ORIGINAL_BACKENDS.to_string(),
                "{not json".to_string(),
            );
            let backends = extract_backends(&ingress);
            assert_eq!(
                backends.get("/api").unwrap(),
                "http://api-svc.demo.svc.cluster.local:8080"
            );
        }
    }

    // =========================================================================
    // Patch and restore
    // =========================================================================

    mod patching {
        use super::*;

        #[test]
        fn test_patch_rewrites_covered_paths_only() {
            let mut ingress = sample_ingress("demo");
            patch_ingress(&mut ingress, &["/api/*".to_string()], "x402-gateway-proxy");

            let (svc, port) = backend_service(&ingress, "/api").unwrap();
            assert_eq!(svc, "x402-gateway-proxy");
            assert_eq!(port, GATEWAY_PORT);

            // The catch-all "/" ingress path is also covered by the paid
            // sub-tree, by design: its traffic can reach paid paths.
            let (svc, _) = backend_service(&ingress, "/").unwrap();
            assert_eq!(svc, "x402-gateway-proxy");
        }

        #[test]
        fn test_patch_leaves_uncovered_paths_alone() {
            let mut ingress = Ingress {
                metadata: ObjectMeta {
                    name: Some("web".into()),
                    namespace: Some("demo".into()),
                    ..Default::default()
                },
                spec: Some(IngressSpec {
                    rules: Some(vec![IngressRule {
                        host: None,
                        http: Some(HTTPIngressRuleValue {
                            paths: vec![
                                http_path("/api", "api-svc", 8080),
                                http_path("/web", "web-svc", 80),
                            ],
                        }),
                    }]),
                    ..Default::default()
                }),
                status: None,
            };
            patch_ingress(&mut ingress, &["/api/*".to_string()], "x402-gateway-proxy");

            assert_eq!(backend_service(&ingress, "/api").unwrap().0, "x402-gateway-proxy");
            assert_eq!(backend_service(&ingress, "/web").unwrap().0, "web-svc");
        }

        #[test]
        fn test_patch_writes_both_annotations() {
            let mut ingress = sample_ingress("demo");
            patch_ingress(&mut ingress, &["/api/*".to_string()], "x402-gateway-proxy");

            let annotations = ingress.annotations();
            assert_eq!(
                annotations.get(ANNOTATION_MANAGED_BY).unwrap(),
                MANAGED_BY_VALUE
            );
            let originals: BTreeMap<String, String> =
                serde_json::from_str(annotations.get(ANNOTATION_ORIGINAL_BACKENDS).unwrap())
                    .unwrap();
            assert_eq!(originals.get("/api").unwrap(), "api-svc:8080");
            assert_eq!(originals.get("/").unwrap(), "web-svc:80");
        }

        /// Story: reconciling an unchanged spec twice must leave the Ingress
        /// byte-identical - no annotation churn, no path flipping.
        #[test]
        fn story_patch_is_idempotent() {
            let paid = vec!["/api/*".to_string()];
            let mut ingress = sample_ingress("demo");
            patch_ingress(&mut ingress, &paid, "x402-gateway-proxy");
            let first = serde_json::to_string(&ingress).unwrap();

            patch_ingress(&mut ingress, &paid, "x402-gateway-proxy");
            let second = serde_json::to_string(&ingress).unwrap();
            assert_eq!(first, second);
        }

        /// Story: deleting the route restores the pre-create backends, by
        /// service name and port, and removes both annotations.
        #[test]
        fn story_restore_round_trips() {
            let original = sample_ingress("demo");
            let mut ingress = original.clone();
            patch_ingress(&mut ingress, &["/api/*".to_string()], "x402-gateway-proxy");
            assert_ne!(
                backend_service(&ingress, "/api"),
                backend_service(&original, "/api")
            );

            assert!(restore_ingress(&mut ingress));

            assert_eq!(
                backend_service(&ingress, "/api").unwrap(),
                ("api-svc".to_string(), 8080)
            );
            // The named-port original was recorded as port 80.
            assert_eq!(
                backend_service(&ingress, "/").unwrap(),
                ("web-svc".to_string(), 80)
            );
            assert!(!ingress.annotations().contains_key(ANNOTATION_ORIGINAL_BACKENDS));
            assert!(!ingress.annotations().contains_key(ANNOTATION_MANAGED_BY));
        }

        #[test]
        fn test_restore_without_annotation_is_a_noop() {
            let mut ingress = sample_ingress("demo");
            assert!(!restore_ingress(&mut ingress));
        }
    }

    // =========================================================================
    // Reconcile flow
    // =========================================================================
    //
    // These tests verify OBSERVABLE OUTCOMES: the Action returned, the store
    // contents, the captured status, and which cluster writes happened.

    mod reconcile_flow {
        use super::*;

        /// Story: a brand-new route gets the finalizer persisted before any
        /// other side effect; the update event re-enters the loop.
        #[tokio::test]
        async fn story_new_route_gets_finalizer_first() {
            let mut mock = MockKubeClient::new();
            mock.expect_add_finalizer()
                .times(1)
                .returning(|_, _| Ok(()));

            let (ctx, store) = test_context(mock);
            let action = reconcile(Arc::new(sample_route("api", "demo")), ctx)
                .await
                .expect("reconcile should succeed");

            assert_eq!(action, Action::await_change());
            assert_eq!(store.count(), 0, "nothing published before the finalizer");
        }

        /// Story: the happy path. The route compiles, is published to the
        /// store, the alias service and Ingress are reconciled, and the
        /// status reports ready.
        #[tokio::test]
        async fn story_route_publishes_and_patches() {
            let mut mock = MockKubeClient::new();
            mock.expect_get_ingress()
                .returning(|_, _| Ok(Some(sample_ingress("demo"))));
            // demo != x402-system, so the alias service is required.
            mock.expect_ensure_gateway_alias()
                .times(1)
                .withf(|ns, target| {
                    ns == "demo" && target == "x402-operator.x402-system.svc.cluster.local"
                })
                .returning(|_, _| Ok(()));
            mock.expect_update_ingress()
                .times(1)
                .withf(|ingress| {
                    let patched = backend_service(ingress, "/api")
                        .is_some_and(|(svc, port)| svc == EXTERNAL_SERVICE_NAME && port == GATEWAY_PORT);
                    patched && ingress.annotations().contains_key(ANNOTATION_ORIGINAL_BACKENDS)
                })
                .returning(|_| Ok(()));
            let capture = capture_status(&mut mock);

            let (ctx, store) = test_context(mock);
            let action = reconcile(Arc::new(route_with_finalizer("api", "demo")), ctx)
                .await
                .expect("reconcile should succeed");

            assert_eq!(action, Action::await_change());
            assert_eq!(store.count(), 1);
            let compiled = &store.snapshot()[0];
            assert_eq!(compiled.rules.len(), 2);
            assert_eq!(
                compiled.backends.get("/api").unwrap(),
                "http://api-svc.demo.svc.cluster.local:8080"
            );

            let status = capture.last().expect("status should be updated");
            assert!(status.ready);
            assert!(status.ingress_patched);
            assert_eq!(status.active_routes, 2);
            assert!(status
                .conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == ConditionStatus::True));
        }

        /// Story: an ingress in the operator's own namespace uses the
        /// operator service directly - no alias service is created.
        #[tokio::test]
        async fn story_same_namespace_skips_alias_service() {
            let mut mock = MockKubeClient::new();
            mock.expect_get_ingress()
                .returning(|_, _| Ok(Some(sample_ingress("x402-system"))));
            mock.expect_update_ingress()
                .times(1)
                .withf(|ingress| {
                    backend_service(ingress, "/api")
                        .is_some_and(|(svc, _)| svc == "x402-operator")
                })
                .returning(|_| Ok(()));
            capture_status(&mut mock);

            let (ctx, _store) = test_context(mock);
            reconcile(Arc::new(route_with_finalizer("api", "x402-system")), ctx)
                .await
                .expect("reconcile should succeed");
            // No expect_ensure_gateway_alias: a call would panic the mock.
        }

        /// Story: an unparsable condition regex leaves Ready=False with
        /// reason CompileError, publishes nothing, and does not patch the
        /// Ingress. The controller then waits for a spec change.
        #[tokio::test]
        async fn story_invalid_regex_reports_compile_error() {
            let mut mock = MockKubeClient::new();
            mock.expect_get_ingress()
                .returning(|_, _| Ok(Some(sample_ingress("demo"))));
            let capture = capture_status(&mut mock);

            let mut route = route_with_finalizer("api", "demo");
            route.spec.routes[0].conditions = vec![PaymentCondition {
                header: "X".into(),
                pattern: "(".into(),
                action: ConditionAction::Pay,
            }];

            let (ctx, store) = test_context(mock);
            let action = reconcile(Arc::new(route), ctx)
                .await
                .expect("compile errors are not reconcile errors");

            assert_eq!(action, Action::await_change());
            assert_eq!(store.count(), 0, "no partial publish");

            let status = capture.last().expect("status should be updated");
            assert!(!status.ready);
            let ready = status
                .conditions
                .iter()
                .find(|c| c.type_ == "Ready")
                .unwrap();
            assert_eq!(ready.status, ConditionStatus::False);
            assert_eq!(ready.reason, "CompileError");
        }

        /// Story: a missing Ingress surfaces a retryable error after
        /// recording IngressPatched=False / IngressNotFound.
        #[tokio::test]
        async fn story_missing_ingress_is_retried() {
            let mut mock = MockKubeClient::new();
            mock.expect_get_ingress().returning(|_, _| Ok(None));
            let capture = capture_status(&mut mock);

            let (ctx, store) = test_context(mock);
            let result = reconcile(Arc::new(route_with_finalizer("api", "demo")), ctx).await;

            let err = result.unwrap_err();
            assert!(err.is_retryable());
            assert_eq!(store.count(), 0);

            let status = capture.last().expect("status should be updated");
            let cond = status
                .conditions
                .iter()
                .find(|c| c.type_ == "IngressPatched")
                .unwrap();
            assert_eq!(cond.status, ConditionStatus::False);
            assert_eq!(cond.reason, "IngressNotFound");
        }

        /// Story: deletion restores the Ingress from the annotation, drops
        /// the store entry, removes the now-unused alias service, and only
        /// then releases the finalizer.
        #[tokio::test]
        async fn story_deletion_restores_and_releases() {
            let mut patched = sample_ingress("demo");
            patch_ingress(&mut patched, &["/api/*".to_string()], EXTERNAL_SERVICE_NAME);

            let mut mock = MockKubeClient::new();
            mock.expect_get_ingress()
                .returning(move |_, _| Ok(Some(patched.clone())));
            mock.expect_update_ingress()
                .times(1)
                .withf(|ingress| {
                    backend_service(ingress, "/api")
                        .is_some_and(|(svc, port)| svc == "api-svc" && port == 8080)
                        && !ingress.annotations().contains_key(ANNOTATION_ORIGINAL_BACKENDS)
                        && !ingress.annotations().contains_key(ANNOTATION_MANAGED_BY)
                })
                .returning(|_| Ok(()));
            mock.expect_list_routes().returning(|| Ok(vec![]));
            mock.expect_delete_gateway_alias()
                .times(1)
                .withf(|ns| ns == "demo")
                .returning(|_| Ok(()));
            mock.expect_remove_finalizer()
                .times(1)
                .returning(|_, _| Ok(()));

            let (ctx, store) = test_context(mock);
            store.set("demo", "api", compile_route(&sample_route("api", "demo"), HashMap::new()).unwrap());

            let action = reconcile(Arc::new(deleted_route("api", "demo")), ctx)
                .await
                .expect("cleanup should succeed");

            assert_eq!(action, Action::await_change());
            assert_eq!(store.count(), 0);
        }

        /// Story: the alias service survives deletion while another route
        /// still references the same ingress namespace.
        #[tokio::test]
        async fn story_alias_survives_while_still_referenced() {
            let mut mock = MockKubeClient::new();
            mock.expect_get_ingress().returning(|_, _| Ok(None));
            mock.expect_list_routes()
                .returning(|| Ok(vec![route_with_finalizer("other", "demo")]));
            mock.expect_remove_finalizer().returning(|_, _| Ok(()));
            // No expect_delete_gateway_alias: a call would panic the mock.

            let (ctx, _store) = test_context(mock);
            reconcile(Arc::new(deleted_route("api", "demo")), ctx)
                .await
                .expect("cleanup should succeed");
        }

        /// Story: cluster API failures propagate so the error policy can
        /// retry with backoff.
        #[tokio::test]
        async fn story_patch_failures_propagate() {
            let mut mock = MockKubeClient::new();
            mock.expect_get_ingress()
                .returning(|_, _| Ok(Some(sample_ingress("demo"))));
            mock.expect_ensure_gateway_alias().returning(|_, _| Ok(()));
            mock.expect_update_ingress()
                .returning(|_| Err(Error::internal("connection refused")));
            let capture = capture_status(&mut mock);

            let (ctx, _store) = test_context(mock);
            let result = reconcile(Arc::new(route_with_finalizer("api", "demo")), ctx).await;

            assert!(result.is_err());
            let status = capture.last().unwrap();
            let cond = status
                .conditions
                .iter()
                .find(|c| c.type_ == "IngressPatched")
                .unwrap();
            assert_eq!(cond.reason, "PatchError");
        }
    }

    mod error_policy_tests {
        use super::*;

        fn empty_context() -> Arc<Context> {
            let (ctx, _) = test_context(MockKubeClient::new());
            ctx
        }

        #[test]
        fn test_retryable_errors_requeue_with_backoff() {
            let action = error_policy(
                Arc::new(sample_route("api", "demo")),
                &Error::internal("transient"),
                empty_context(),
            );
            assert_eq!(action, Action::requeue(Duration::from_secs(5)));
        }

        #[test]
        fn test_spec_errors_await_change() {
            let action = error_policy(
                Arc::new(sample_route("api", "demo")),
                &Error::compile("bad regex"),
                empty_context(),
            );
            assert_eq!(action, Action::await_change());
        }
    }

    mod ingress_watch_mapping {
        use super::*;

        fn managed_ingress(namespace: &str) -> Ingress {
            let mut ingress = sample_ingress(namespace);
            ingress
                .annotations_mut()
                .insert(ANNOTATION_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string());
            ingress
        }

        #[test]
        fn test_managed_ingress_maps_to_referencing_routes() {
            let store = RouteStore::new();
            store.set(
                "demo",
                "api",
                compile_route(&sample_route("api", "demo"), HashMap::new()).unwrap(),
            );

            let refs = ingress_to_routes(&store, &managed_ingress("demo"));
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].name, "api");
            assert_eq!(refs[0].namespace.as_deref(), Some("demo"));
        }

        #[test]
        fn test_unmanaged_ingress_maps_to_nothing() {
            let store = RouteStore::new();
            store.set(
                "demo",
                "api",
                compile_route(&sample_route("api", "demo"), HashMap::new()).unwrap(),
            );
            assert!(ingress_to_routes(&store, &sample_ingress("demo")).is_empty());
        }

        #[test]
        fn test_foreign_namespace_ingress_does_not_match() {
            let store = RouteStore::new();
            store.set(
                "demo",
                "api",
                compile_route(&sample_route("api", "demo"), HashMap::new()).unwrap(),
            );
            assert!(ingress_to_routes(&store, &managed_ingress("elsewhere")).is_empty());
        }
    }
}
