//! Gateway API Policy Resolution
//!
//! A discovery cycle resolves, for every resource in a snapshot, which policies apply to it and
//! what their effective merged values are. It proceeds in four steps, entirely in memory:
//!
//! - Each policy CRD is classified by its `gateway.networking.k8s.io/policy` label as describing
//!   *Direct* or *Inherited* policies. Kinds with any other label value are excluded.
//! - The resources are linked into a hierarchy by resolving their references. A Gateway's class
//!   is its parent; a Route's Gateways are its parents; a Route's backends, including the targets
//!   of request mirrors, are its children.
//! - Each policy instance is bound to the one resource its `targetRef` names.
//! - For any resource, Direct policies that target it exactly are passed through, and Inherited
//!   policies attached anywhere along its ancestor chain are merged.
//!
//! ```text
//! [ GatewayClass ] <- [ Gateway ] <- [ HTTPRoute ] -> [ Backend ]
//!        ^                ^                ^               ^
//!        `----------------`---- [ Policy.targetRef ] ------`
//! ```
//!
//! A [`ResourceModel`] holds the results of one cycle. It is never updated: a new snapshot is
//! resolved by building a new model, so no classification or graph data outlives its cycle.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod attachment;
pub mod classify;
pub mod effective;
pub mod graph;
mod report;


pub use self::{
    attachment::Attachments,
    classify::Descriptors,
    effective::Engine,
    graph::{Graph, NodeKind, ResourceNode},
    report::{InheritedPolicyRef, NodePolicies, PolicyRef, Report},
};
use gateway_policy_resolver_core::{Error, ObjRef, Resolver};
use gateway_policy_resolver_k8s_api::{
    crd::{self, CustomResourceDefinition},
    gateway::{Gateway, GatewayClass, HttpRoute},
    DynamicObject, Namespace,
};
use serde::{Serialize, Serializer};

/// Configures how a discovery cycle resolves references and classifies policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The namespace assumed for namespaced references when neither the reference nor its
    /// referrer specifies one.
    pub default_namespace: String,

    /// The CRD label that declares a policy kind's classification.
    pub policy_label_key: String,

    /// Whether a resource's Namespace participates in inherited policy resolution, immediately
    /// above the resource itself.
    pub namespace_ancestors: bool,
}

/// All objects observed in one discovery cycle.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub gateway_classes: Vec<GatewayClass>,
    pub gateways: Vec<Gateway>,
    pub http_routes: Vec<HttpRoute>,
    pub backends: Vec<DynamicObject>,
    pub namespaces: Vec<Namespace>,
    pub crds: Vec<CustomResourceDefinition>,
    pub policies: Vec<DynamicObject>,

    /// Objects that could not be read, reported as diagnostics of the cycle.
    pub rejected: Vec<Diagnostic>,
}

/// A condition that caused part of a snapshot to be omitted from results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// The object holding the offending reference or declaration.
    pub resource: ObjRef,

    #[serde(rename = "message", serialize_with = "serialize_error")]
    pub error: Error,
}

/// The result of one discovery cycle.
///
/// Immutable once built, so it may be shared freely between readers.
#[derive(Debug)]
pub struct ResourceModel {
    config: Config,
    graph: Graph,
    descriptors: Descriptors,
    attachments: Attachments,
    diagnostics: Vec<Diagnostic>,
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        Self {
            default_namespace: gateway_policy_resolver_core::DEFAULT_NAMESPACE.to_string(),
            policy_label_key: gateway_policy_resolver_core::POLICY_LABEL_KEY.to_string(),
            namespace_ancestors: false,
        }
    }
}

// === impl Diagnostic ===

impl Diagnostic {
    pub fn new(resource: ObjRef, error: Error) -> Self {
        Self { resource, error }
    }
}

fn serialize_error<S: Serializer>(error: &Error, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

// === impl ResourceModel ===

impl ResourceModel {
    /// Runs a discovery cycle over a snapshot.
    pub fn discover(snapshot: &Snapshot, config: &Config) -> Self {
        let mut diagnostics = snapshot.rejected.clone();

        let mut resolver = Resolver::new(config.default_namespace.clone());
        for crd in snapshot.crds.iter().filter(|crd| crd::is_cluster_scoped(crd)) {
            resolver.register_cluster_scoped(crd::group_kind(crd));
        }

        let descriptors =
            Descriptors::classify(&snapshot.crds, &config.policy_label_key, &mut diagnostics);
        let graph = Graph::build(
            snapshot,
            &resolver,
            config.namespace_ancestors,
            &mut diagnostics,
        );
        let attachments = Attachments::index(
            &snapshot.policies,
            &graph,
            &descriptors,
            &resolver,
            &mut diagnostics,
        );

        let mut model = Self {
            config: config.clone(),
            graph,
            descriptors,
            attachments,
            diagnostics,
        };
        let cycles = model.detect_cycles();
        model.diagnostics.extend(cycles);
        tracing::debug!(
            resources = model.graph.len(),
            diagnostics = model.diagnostics.len(),
            "discovered resources"
        );
        model
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(
            &self.graph,
            &self.attachments,
            self.config.namespace_ancestors,
        )
    }

    /// Describes the policies that apply to a single resource.
    pub fn policies_for(&self, node: &ObjRef) -> Option<NodePolicies> {
        let node = self.graph.node(node)?;
        Some(NodePolicies::new(node, &self.engine()))
    }

    /// Describes the policies that apply to every resource, ordered by reference.
    pub fn report(&self) -> Report {
        let engine = self.engine();
        Report {
            resources: self
                .graph
                .nodes()
                .map(|node| NodePolicies::new(node, &engine))
                .collect(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    /// Walks every resource's ancestors once, recording each node at which a cycle closes.
    fn detect_cycles(&self) -> Vec<Diagnostic> {
        let engine = self.engine();
        let mut seen = ahash::AHashSet::new();
        let mut cycles = Vec::new();
        for node in self.graph.nodes() {
            for repeated in engine.ancestry(&node.id).cycles {
                if seen.insert(repeated.clone()) {
                    tracing::warn!(node = %repeated, "ancestor cycle detected");
                    cycles.push(Diagnostic::new(
                        repeated.clone(),
                        Error::CycleDetected { node: repeated },
                    ));
                }
            }
        }
        cycles
    }
}
