//! The resource hierarchy of a discovery cycle.

use crate::{Diagnostic, Snapshot};
use gateway_policy_resolver_core::{GroupKind, ObjRef, Reference, Resolver, GATEWAY_GROUP};
use gateway_policy_resolver_k8s_api::{self as k8s, dynamic, gateway, ResourceExt};
use serde::Serialize;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

/// Parent/child links between the resources of one snapshot.
///
/// Edges point from a parent to its children: a GatewayClass to its Gateways, a Gateway to the
/// Routes attached to it, and a Route to its backends. Nodes are kept in `ObjRef` order so that
/// everything derived from the graph is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: BTreeMap<ObjRef, ResourceNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceNode {
    pub id: ObjRef,
    pub kind: NodeKind,

    /// The resource's spec, or `None` if the resource was referenced but never observed.
    pub spec: Option<serde_json::Value>,

    parents: BTreeSet<ObjRef>,
    children: BTreeSet<ObjRef>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    GatewayClass,
    Gateway,
    #[serde(rename = "HTTPRoute")]
    HttpRoute,
    Backend,
    Namespace,
}

// === impl Graph ===

impl Graph {
    pub fn build(
        snapshot: &Snapshot,
        resolver: &Resolver,
        namespace_nodes: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut builder = Builder {
            graph: Self::default(),
            resolver,
            diagnostics,
        };

        for ns in &snapshot.namespaces {
            if let Some(id) = builder.typed_id(ns) {
                let spec = to_value(&ns.spec.clone().unwrap_or_default());
                builder.observe(id, NodeKind::Namespace, spec);
            }
        }

        for class in &snapshot.gateway_classes {
            if let Some(id) = builder.typed_id(class) {
                builder.observe(id, NodeKind::GatewayClass, to_value(&class.spec));
            }
        }

        for backend in &snapshot.backends {
            match dynamic::obj_ref(backend) {
                Some(id) => {
                    let id = builder.normalize(id);
                    let spec = dynamic::spec(backend).cloned().map(serde_json::Value::Object);
                    builder.observe(id, NodeKind::Backend, spec);
                }
                None => tracing::warn!(
                    name = ?backend.metadata.name,
                    "ignoring backend without a kind or name"
                ),
            }
        }

        for gateway in &snapshot.gateways {
            let Some(id) = builder.typed_id(gateway) else {
                continue;
            };
            builder.observe(id.clone(), NodeKind::Gateway, to_value(&gateway.spec));
            builder.link_parent(
                &id,
                &gateway::class_ref(&gateway.spec),
                NodeKind::GatewayClass,
            );
        }

        for route in &snapshot.http_routes {
            let Some(id) = builder.typed_id(route) else {
                continue;
            };
            builder.observe(id.clone(), NodeKind::HttpRoute, to_value(&route.spec));
            for parent in gateway::parent_refs(&route.spec) {
                builder.link_parent(&id, &parent, NodeKind::Gateway);
            }

            // Backends may be named by several rules and mirror filters. The child set holds each
            // at most once.
            for backend in gateway::backend_refs(&route.spec) {
                builder.link_child(&id, &backend, NodeKind::Backend);
            }
        }

        if namespace_nodes {
            let namespaces = builder
                .graph
                .nodes
                .keys()
                .filter(|id| !id.is_cluster_scoped())
                .map(|id| ObjRef::cluster("", "Namespace", id.namespace.clone()))
                .collect::<BTreeSet<_>>();
            for ns in namespaces {
                builder.placeholder(ns, NodeKind::Namespace);
            }
        }

        tracing::debug!(nodes = builder.graph.len(), "built resource graph");
        builder.graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &ObjRef) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &ObjRef) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Iterates over all nodes in `ObjRef` order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn parents(&self, id: &ObjRef) -> impl Iterator<Item = &ObjRef> {
        self.nodes.get(id).into_iter().flat_map(|n| n.parents.iter())
    }

    pub fn children(&self, id: &ObjRef) -> impl Iterator<Item = &ObjRef> {
        self.nodes.get(id).into_iter().flat_map(|n| n.children.iter())
    }

    /// The distinct backends referenced by a route.
    pub fn backends_for(&self, route: &ObjRef) -> BTreeSet<&ObjRef> {
        self.children(route)
            .filter(|child| {
                self.nodes
                    .get(*child)
                    .map_or(false, |n| n.kind == NodeKind::Backend)
            })
            .collect()
    }
}

// === impl ResourceNode ===

impl ResourceNode {
    fn placeholder(id: ObjRef, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            spec: None,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.spec.is_none()
    }

    pub fn parents(&self) -> impl Iterator<Item = &ObjRef> {
        self.parents.iter()
    }

    pub fn children(&self) -> impl Iterator<Item = &ObjRef> {
        self.children.iter()
    }
}

// === impl NodeKind ===

impl NodeKind {
    /// Infers the kind of a node that has only been referenced, falling back to the role implied
    /// by the field holding the reference.
    fn infer(id: &ObjRef, fallback: Self) -> Self {
        match (id.group.as_str(), id.kind.as_str()) {
            (GATEWAY_GROUP, "GatewayClass") => Self::GatewayClass,
            (GATEWAY_GROUP, "Gateway") => Self::Gateway,
            (GATEWAY_GROUP, "HTTPRoute") => Self::HttpRoute,
            ("", "Namespace") => Self::Namespace,
            _ => fallback,
        }
    }
}

struct Builder<'a> {
    graph: Graph,
    resolver: &'a Resolver,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Builder<'_> {
    fn typed_id<T>(&self, resource: &T) -> Option<ObjRef>
    where
        T: k8s::Resource,
        T::DynamicType: Default,
    {
        match k8s::obj_ref(resource) {
            Some(id) => Some(self.normalize(id)),
            None => {
                let dt = Default::default();
                tracing::warn!(
                    kind = %T::kind(&dt),
                    namespace = ?resource.namespace(),
                    "ignoring resource without a name"
                );
                None
            }
        }
    }

    /// Namespaced resources that were observed without a namespace live in the default namespace.
    fn normalize(&self, mut id: ObjRef) -> ObjRef {
        if id.namespace.is_empty()
            && !self
                .resolver
                .is_cluster_scoped(&GroupKind::new(id.group.clone(), id.kind.clone()))
        {
            id.namespace = self.resolver.default_namespace().to_string();
        }
        id
    }

    /// Records an observed resource. If the same resource is observed more than once, the last
    /// spec wins; edges accumulate.
    fn observe(&mut self, id: ObjRef, kind: NodeKind, spec: Option<serde_json::Value>) {
        match self.graph.nodes.entry(id) {
            Entry::Vacant(entry) => {
                let mut node = ResourceNode::placeholder(entry.key().clone(), kind);
                node.spec = spec;
                entry.insert(node);
            }
            Entry::Occupied(mut entry) => {
                let node = entry.get_mut();
                node.kind = kind;
                if spec.is_some() {
                    node.spec = spec;
                }
            }
        }
    }

    fn placeholder(&mut self, id: ObjRef, kind: NodeKind) {
        self.graph.nodes.entry(id).or_insert_with_key(|id| {
            let kind = NodeKind::infer(id, kind);
            ResourceNode::placeholder(id.clone(), kind)
        });
    }

    fn resolve(&mut self, from: &ObjRef, reference: &Reference) -> Option<ObjRef> {
        match self.resolver.resolve(reference, &from.namespace) {
            Ok(id) => Some(id),
            Err(error) => {
                tracing::warn!(resource = %from, %error, "dropping reference");
                self.diagnostics.push(Diagnostic::new(from.clone(), error));
                None
            }
        }
    }

    fn link_parent(&mut self, child: &ObjRef, reference: &Reference, role: NodeKind) {
        if let Some(parent) = self.resolve(child, reference) {
            self.link(parent, child.clone(), Some(role), None);
        }
    }

    fn link_child(&mut self, parent: &ObjRef, reference: &Reference, role: NodeKind) {
        if let Some(child) = self.resolve(parent, reference) {
            self.link(parent.clone(), child, None, Some(role));
        }
    }

    /// Adds an edge, creating a placeholder for whichever end has not been observed.
    fn link(
        &mut self,
        parent: ObjRef,
        child: ObjRef,
        parent_role: Option<NodeKind>,
        child_role: Option<NodeKind>,
    ) {
        if let Some(role) = parent_role {
            self.placeholder(parent.clone(), role);
        }
        if let Some(role) = child_role {
            self.placeholder(child.clone(), role);
        }
        tracing::trace!(%parent, %child, "linking");

        if let Some(node) = self.graph.nodes.get_mut(&child) {
            node.parents.insert(parent.clone());
        }
        if let Some(node) = self.graph.nodes.get_mut(&parent) {
            node.children.insert(child);
        }
    }
}

fn to_value<T: Serialize>(spec: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(spec) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(%error, "failed to serialize spec");
            None
        }
    }
}
