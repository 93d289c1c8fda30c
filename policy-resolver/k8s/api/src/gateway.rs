//! Gateway API resources, and the references they make to one another.

pub use gateway_api::apis::standard::{
    gatewayclasses::{GatewayClass, GatewayClassSpec},
    gateways::{Gateway, GatewaySpec},
    httproutes::{
        HTTPRoute as HttpRoute, HTTPRouteParentRefs, HTTPRouteRulesBackendRefs,
        HTTPRouteRulesFiltersRequestMirrorBackendRef, HTTPRouteSpec as HttpRouteSpec,
    },
};
use gateway_policy_resolver_core::{Reference, GATEWAY_GROUP};

pub fn class_ref(gateway: &GatewaySpec) -> Reference {
    Reference::new(GATEWAY_GROUP, "GatewayClass", gateway.gateway_class_name.clone())
}

/// The resources (usually Gateways) that a route attaches to.
pub fn parent_refs(route: &HttpRouteSpec) -> impl Iterator<Item = Reference> + '_ {
    route.parent_refs.iter().flatten().map(parent_ref)
}

/// Every backend named by a route's rules, including the targets of `RequestMirror` filters, in
/// the order they appear. Duplicates are not removed.
pub fn backend_refs(route: &HttpRouteSpec) -> impl Iterator<Item = Reference> + '_ {
    route.rules.iter().flatten().flat_map(|rule| {
        let backends = rule.backend_refs.iter().flatten().map(backend_ref);
        let mirrors = rule
            .filters
            .iter()
            .flatten()
            .filter_map(|filter| filter.request_mirror.as_ref())
            .map(|mirror| mirror_ref(&mirror.backend_ref));
        backends.chain(mirrors)
    })
}

fn parent_ref(parent: &HTTPRouteParentRefs) -> Reference {
    Reference {
        group: parent.group.clone(),
        kind: parent.kind.clone(),
        name: Some(parent.name.clone()),
        namespace: parent.namespace.clone(),
    }
    .parent()
}

fn backend_ref(backend: &HTTPRouteRulesBackendRefs) -> Reference {
    Reference {
        group: backend.group.clone(),
        kind: backend.kind.clone(),
        name: Some(backend.name.clone()),
        namespace: backend.namespace.clone(),
    }
    .backend()
}

fn mirror_ref(backend: &HTTPRouteRulesFiltersRequestMirrorBackendRef) -> Reference {
    Reference {
        group: backend.group.clone(),
        kind: backend.kind.clone(),
        name: Some(backend.name.clone()),
        namespace: backend.namespace.clone(),
    }
    .backend()
}
