use super::*;
use crate::{Descriptors, Diagnostic};
use gateway_policy_resolver_core::{Classification, Error};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case::direct("direct", Classification::Direct)]
#[case::inherited("inherited", Classification::Inherited)]
#[case::mixed_case("Inherited", Classification::Inherited)]
#[case::padded(" direct ", Classification::Direct)]
#[case::other("both", Classification::Unknown)]
#[case::empty("", Classification::Unknown)]
fn classifies_by_label(#[case] label: &str, #[case] expected: Classification) {
    let mut diagnostics = Vec::new();
    let descriptors = Descriptors::classify(
        &[mk_policy_crd(HEALTH_CHECK, Some(label))],
        POLICY_LABEL_KEY,
        &mut diagnostics,
    );
    assert_eq!(
        descriptors.classification(&kind(HEALTH_CHECK)),
        Some(expected)
    );
    assert_eq!(
        diagnostics.len(),
        usize::from(expected == Classification::Unknown)
    );
}

#[test]
fn unlabeled_crds_are_not_policies() {
    let mut diagnostics = Vec::new();
    let descriptors = Descriptors::classify(
        &[
            mk_policy_crd(("example.com", "Widget"), None),
            mk_policy_crd(TIMEOUT, Some("direct")),
        ],
        POLICY_LABEL_KEY,
        &mut diagnostics,
    );
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors.get(&kind(("example.com", "Widget"))), None);
    assert_eq!(
        descriptors.classification(&kind(TIMEOUT)),
        Some(Classification::Direct)
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn custom_label_key() {
    let mut test = TestConfig::default();
    test.config.policy_label_key = "example.com/policy".to_string();
    test.snapshot
        .crds
        .push(mk_policy_crd(HEALTH_CHECK, Some("inherited")));
    let model = test.discover();

    // The CRD carries the standard label, which is no longer consulted.
    assert!(model.descriptors().is_empty());
}

#[test]
fn unknown_classifications_are_reported() {
    let mut test = TestConfig::with_hierarchy();
    test.snapshot
        .crds
        .push(mk_policy_crd(("baz.com", "RetryPolicy"), Some("sometimes")));
    test.snapshot.policies.push(mk_policy(
        ("baz.com", "RetryPolicy"),
        "default",
        "retry",
        json!({
            "targetRef": {"group": GATEWAY_GROUP, "kind": "Gateway", "name": "foo-gateway"},
            "attempts": 3,
        }),
    ));
    let model = test.discover();

    assert_eq!(
        model
            .descriptors()
            .iter()
            .map(|d| (d.kind.to_string(), d.classification))
            .collect::<Vec<_>>(),
        vec![
            ("HealthCheckPolicy.foo.com".to_string(), Classification::Inherited),
            ("RetryPolicy.baz.com".to_string(), Classification::Unknown),
            ("TimeoutPolicy.bar.com".to_string(), Classification::Direct),
        ]
    );
    assert_eq!(
        model.diagnostics(),
        [Diagnostic::new(
            ObjRef::cluster(
                "apiextensions.k8s.io",
                "CustomResourceDefinition",
                "retrypolicys.baz.com"
            ),
            Error::UnknownPolicyClassification {
                kind: kind(("baz.com", "RetryPolicy")),
                label: Some("sometimes".to_string()),
            },
        )]
    );

    // Instances of the kind are never attached.
    let gateway = gateway_ref("default", "foo-gateway");
    assert!(model.attachments().is_empty());
    assert!(model.engine().effective(&gateway).is_empty());
}
