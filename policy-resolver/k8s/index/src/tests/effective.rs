use super::*;
use crate::Diagnostic;
use gateway_policy_resolver_core::{Candidate, EffectivePolicies, EffectivePolicy, Error};
use maplit::btreemap;
use pretty_assertions::assert_eq;

fn target(group: &str, kind: &str, name: &str) -> serde_json::Value {
    json!({"group": group, "kind": kind, "name": name})
}

/// Adds the health check and timeout policies attached throughout the standard hierarchy.
fn with_policies(test: &mut TestConfig) {
    test.snapshot.policies.extend([
        mk_policy(
            HEALTH_CHECK,
            "default",
            "health-check-gatewayclass",
            json!({
                "targetRef": target(GATEWAY_GROUP, "GatewayClass", "foo-gatewayclass"),
                "override": {"key1": "parent-1", "key3": "parent-3", "key5": "parent-5"},
                "default": {"key2": "parent-2", "key4": "parent-4"},
            }),
        ),
        mk_policy(
            HEALTH_CHECK,
            "default",
            "health-check-gateway",
            json!({
                "targetRef": target(GATEWAY_GROUP, "Gateway", "foo-gateway"),
                "override": {"key1": "child-1"},
                "default": {"key2": "child-2", "key5": "child-5"},
            }),
        ),
        mk_policy(
            TIMEOUT,
            "default",
            "timeout-policy-namespace",
            json!({
                "targetRef": target("", "Namespace", "default"),
                "condition": "path=/abc",
                "seconds": 30,
            }),
        ),
        mk_policy(
            TIMEOUT,
            "default",
            "timeout-policy-httproute",
            json!({
                "targetRef": target(GATEWAY_GROUP, "HTTPRoute", "foo-httproute"),
                "condition": "path=/def",
                "seconds": 60,
            }),
        ),
    ]);
}

fn health_check_of(effective: &EffectivePolicies) -> Option<&Fields> {
    effective.get(&kind(HEALTH_CHECK))?.resolved()
}

#[test]
fn inherited_policies_merge_down_the_hierarchy() {
    let mut test = TestConfig::with_hierarchy();
    with_policies(&mut test);
    let model = test.discover();
    let engine = model.engine();

    let merged = fields(json!({
        "key1": "child-1",
        "key2": "child-2",
        "key3": "parent-3",
        "key4": "parent-4",
        "key5": "parent-5",
    }));

    let gateway = gateway_ref("default", "foo-gateway");
    let route = route_ref("default", "foo-httproute");
    let svc = service_ref("default", "foo-svc");
    assert_eq!(health_check_of(&engine.effective(&gateway)), Some(&merged));
    assert_eq!(health_check_of(&engine.effective(&route)), Some(&merged));
    assert_eq!(health_check_of(&engine.effective(&svc)), Some(&merged));

    // The class sees only its own policy.
    assert_eq!(
        health_check_of(&engine.effective(&class_ref("foo-gatewayclass"))),
        Some(&fields(json!({
            "key1": "parent-1",
            "key2": "parent-2",
            "key3": "parent-3",
            "key4": "parent-4",
            "key5": "parent-5",
        })))
    );
    assert!(model.diagnostics().is_empty());
}

#[test]
fn direct_policies_pass_through() {
    let mut test = TestConfig::with_hierarchy();
    with_policies(&mut test);
    let model = test.discover();
    let engine = model.engine();

    let route = route_ref("default", "foo-httproute");
    assert_eq!(
        engine.effective(&route).get(&kind(TIMEOUT)),
        Some(&EffectivePolicy::Resolved(fields(json!({
            "condition": "path=/def",
            "seconds": 60,
        }))))
    );

    // Direct policies do not flow to descendants.
    assert_eq!(
        engine
            .effective(&service_ref("default", "foo-svc"))
            .get(&kind(TIMEOUT)),
        None
    );
    assert_eq!(
        engine
            .effective(&namespace_ref("default"))
            .get(&kind(TIMEOUT)),
        Some(&EffectivePolicy::Resolved(fields(json!({
            "condition": "path=/abc",
            "seconds": 30,
        }))))
    );
}

#[test]
fn direct_policies_never_traverse_namespaces() {
    let mut test = TestConfig::with_hierarchy();
    test.config.namespace_ancestors = true;
    with_policies(&mut test);
    let model = test.discover();

    assert_eq!(
        model
            .engine()
            .effective(&route_ref("default", "foo-httproute"))
            .get(&kind(TIMEOUT)),
        Some(&EffectivePolicy::Resolved(fields(json!({
            "condition": "path=/def",
            "seconds": 60,
        }))))
    );
}

#[test]
fn absent_kinds_are_omitted() {
    let test = TestConfig::with_hierarchy();
    let model = test.discover();
    let engine = model.engine();
    for node in model.graph().nodes() {
        assert!(engine.effective(&node.id).is_empty(), "{}", node.id);
    }
}

#[test]
fn ancestor_chains() {
    let test = TestConfig::with_hierarchy();
    let model = test.discover();
    let engine = model.engine();

    let class = class_ref("foo-gatewayclass");
    let gateway = gateway_ref("default", "foo-gateway");
    let route = route_ref("default", "foo-httproute");
    let svc = service_ref("default", "foo-svc");
    assert_eq!(
        engine.ancestors(&svc),
        vec![class.clone(), gateway.clone(), route.clone(), svc.clone()]
    );
    assert_eq!(engine.ancestors(&class), vec![class.clone()]);

    // Unknown resources have no ancestors but themselves.
    let missing = service_ref("default", "missing");
    assert_eq!(engine.ancestors(&missing), vec![missing.clone()]);
}

#[test]
fn namespace_ancestors() {
    let mut test = TestConfig::with_hierarchy();
    test.snapshot.policies.push(mk_policy(
        HEALTH_CHECK,
        "default",
        "health-check-namespace",
        json!({
            "targetRef": target("", "Namespace", "default"),
            "default": {"key1": "ns-1", "key2": "ns-2"},
        }),
    ));
    let route = route_ref("default", "foo-httproute");

    let model = test.discover();
    assert_eq!(
        model.engine().ancestors(&route),
        vec![
            class_ref("foo-gatewayclass"),
            gateway_ref("default", "foo-gateway"),
            route.clone(),
        ]
    );
    assert_eq!(health_check_of(&model.engine().effective(&route)), None);

    test.config.namespace_ancestors = true;
    let model = test.discover();
    // The namespace appears once, immediately above the route.
    assert_eq!(
        model.engine().ancestors(&route),
        vec![
            class_ref("foo-gatewayclass"),
            gateway_ref("default", "foo-gateway"),
            namespace_ref("default"),
            route.clone(),
        ]
    );
    assert_eq!(
        health_check_of(&model.engine().effective(&route)),
        Some(&fields(json!({"key1": "ns-1", "key2": "ns-2"})))
    );
}

#[test]
fn inherited_policies_are_listed_in_chain_order() {
    let mut test = TestConfig::with_hierarchy();
    with_policies(&mut test);
    let model = test.discover();
    let engine = model.engine();

    let route = route_ref("default", "foo-httproute");
    assert_eq!(
        engine
            .inherited(&route)
            .into_iter()
            .map(|p| (p.id.name.as_str(), p.target.clone()))
            .collect::<Vec<_>>(),
        vec![
            ("health-check-gatewayclass", class_ref("foo-gatewayclass")),
            ("health-check-gateway", gateway_ref("default", "foo-gateway")),
        ]
    );
    assert_eq!(
        engine
            .directly_attached(&route)
            .into_iter()
            .map(|p| p.id.name.as_str())
            .collect::<Vec<_>>(),
        vec!["timeout-policy-httproute"]
    );

    // An inherited policy is listed as inherited even on its own target.
    let gateway = gateway_ref("default", "foo-gateway");
    assert!(engine.directly_attached(&gateway).is_empty());
    assert_eq!(
        engine
            .inherited(&gateway)
            .into_iter()
            .map(|p| p.id.name.as_str())
            .collect::<Vec<_>>(),
        vec!["health-check-gatewayclass", "health-check-gateway"]
    );
}

#[test]
fn ambiguous_direct_policies() {
    let mut test = TestConfig::with_hierarchy();
    for (name, seconds) in [("timeout-b", 20), ("timeout-a", 10)] {
        test.snapshot.policies.push(mk_policy(
            TIMEOUT,
            "default",
            name,
            json!({
                "targetRef": target(GATEWAY_GROUP, "HTTPRoute", "foo-httproute"),
                "seconds": seconds,
            }),
        ));
    }
    let model = test.discover();

    assert_eq!(
        model
            .engine()
            .effective(&route_ref("default", "foo-httproute")),
        btreemap! {
            kind(TIMEOUT) => EffectivePolicy::Ambiguous(vec![
                Candidate {
                    policy: policy_ref(TIMEOUT, "default", "timeout-a"),
                    fields: fields(json!({"seconds": 10})),
                },
                Candidate {
                    policy: policy_ref(TIMEOUT, "default", "timeout-b"),
                    fields: fields(json!({"seconds": 20})),
                },
            ]),
        }
    );
}

/// A route attached to two Gateways of the same class.
fn with_two_gateways() -> TestConfig {
    let mut test = TestConfig::with_hierarchy();
    test.snapshot
        .gateways
        .push(mk_gateway("default", "bar-gateway", "foo-gatewayclass"));
    test.snapshot.http_routes = vec![mk_route(
        "default",
        "foo-httproute",
        json!({"parentRefs": [{"name": "foo-gateway"}, {"name": "bar-gateway"}]}),
    )];
    test.snapshot.policies.extend([
        mk_policy(
            HEALTH_CHECK,
            "default",
            "health-check-gatewayclass",
            json!({
                "targetRef": target(GATEWAY_GROUP, "GatewayClass", "foo-gatewayclass"),
                "default": {"interval": "10s", "path": "/healthz"},
            }),
        ),
        mk_policy(
            HEALTH_CHECK,
            "default",
            "health-check-foo",
            json!({
                "targetRef": target(GATEWAY_GROUP, "Gateway", "foo-gateway"),
                "default": {"interval": "5s"},
            }),
        ),
        mk_policy(
            HEALTH_CHECK,
            "default",
            "health-check-bar",
            json!({
                "targetRef": target(GATEWAY_GROUP, "Gateway", "bar-gateway"),
                "default": {"interval": "1s"},
            }),
        ),
    ]);
    test
}

#[test]
fn multiple_parents_are_linearized() {
    let test = with_two_gateways();
    let model = test.discover();
    let engine = model.engine();

    let route = route_ref("default", "foo-httproute");
    assert_eq!(
        engine.ancestors(&route),
        vec![
            class_ref("foo-gatewayclass"),
            gateway_ref("default", "bar-gateway"),
            gateway_ref("default", "foo-gateway"),
            route.clone(),
        ]
    );

    // The closest contributor wins, and between equally close parents the later one in
    // reference order.
    assert_eq!(
        health_check_of(&engine.effective(&route)),
        Some(&fields(json!({"interval": "5s", "path": "/healthz"})))
    );
}

#[test]
fn effective_through_one_parent() {
    let test = with_two_gateways();
    let model = test.discover();
    let engine = model.engine();

    let route = route_ref("default", "foo-httproute");
    let via_bar = engine
        .effective_via(&route, &gateway_ref("default", "bar-gateway"))
        .expect("bar-gateway is a parent");
    assert_eq!(
        health_check_of(&via_bar),
        Some(&fields(json!({"interval": "1s", "path": "/healthz"})))
    );
    let via_foo = engine
        .effective_via(&route, &gateway_ref("default", "foo-gateway"))
        .expect("foo-gateway is a parent");
    assert_eq!(
        health_check_of(&via_foo),
        Some(&fields(json!({"interval": "5s", "path": "/healthz"})))
    );

    assert_eq!(
        engine.effective_via(&route, &class_ref("foo-gatewayclass")),
        None
    );
}

#[test]
fn cycles_are_cut() {
    let mut test = TestConfig::default();
    test.snapshot.crds.push(mk_policy_crd(HEALTH_CHECK, Some("inherited")));
    let route_parent = |name: &str| {
        json!({"parentRefs": [{"group": GATEWAY_GROUP, "kind": "HTTPRoute", "name": name}]})
    };
    test.snapshot.http_routes.extend([
        mk_route("ns-0", "route-a", route_parent("route-b")),
        mk_route("ns-0", "route-b", route_parent("route-a")),
    ]);
    test.snapshot.policies.extend([
        mk_policy(
            HEALTH_CHECK,
            "ns-0",
            "hc-a",
            json!({"targetRef": target(GATEWAY_GROUP, "HTTPRoute", "route-a"), "default": {"k": "a"}}),
        ),
        mk_policy(
            HEALTH_CHECK,
            "ns-0",
            "hc-b",
            json!({"targetRef": target(GATEWAY_GROUP, "HTTPRoute", "route-b"), "default": {"k": "b"}}),
        ),
    ]);
    let model = test.discover();
    let engine = model.engine();

    let a = route_ref("ns-0", "route-a");
    let b = route_ref("ns-0", "route-b");
    let ancestry = engine.ancestry(&a);
    assert_eq!(ancestry.chain, vec![b.clone(), a.clone()]);
    assert_eq!(ancestry.cycles, vec![a.clone()]);
    assert_eq!(
        health_check_of(&engine.effective(&a)),
        Some(&fields(json!({"k": "a"})))
    );
    assert_eq!(
        health_check_of(&engine.effective(&b)),
        Some(&fields(json!({"k": "b"})))
    );

    assert_eq!(
        model.diagnostics(),
        [
            Diagnostic::new(a.clone(), Error::CycleDetected { node: a }),
            Diagnostic::new(b.clone(), Error::CycleDetected { node: b }),
        ]
    );
}
