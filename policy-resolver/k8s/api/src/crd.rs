pub use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
};

use gateway_policy_resolver_core::GroupKind;

/// The kind defined by a CRD.
pub fn group_kind(crd: &CustomResourceDefinition) -> GroupKind {
    GroupKind::new(crd.spec.group.clone(), crd.spec.names.kind.clone())
}

pub fn is_cluster_scoped(crd: &CustomResourceDefinition) -> bool {
    crd.spec.scope.eq_ignore_ascii_case("Cluster")
}

/// Returns the value of a label on the CRD's own metadata.
pub fn label<'c>(crd: &'c CustomResourceDefinition, key: &str) -> Option<&'c str> {
    crd.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
}
