#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod crd;
pub mod dynamic;
pub mod gateway;

pub use k8s_openapi::api::core::v1::Namespace;
pub use kube::{
    core::{DynamicObject, ObjectMeta, TypeMeta},
    Resource, ResourceExt,
};

use gateway_policy_resolver_core::ObjRef;

/// Returns the reference identifying a statically-typed resource.
///
/// Returns `None` if the resource has no name.
pub fn obj_ref<T>(resource: &T) -> Option<ObjRef>
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    let name = resource.meta().name.clone()?;
    Some(ObjRef::new(
        T::group(&dt),
        T::kind(&dt),
        resource.meta().namespace.clone().unwrap_or_default(),
        name,
    ))
}

/// Splits an `apiVersion` into its group, which is empty for the core API group.
pub fn api_group(api_version: &str) -> &str {
    match api_version.rsplit_once('/') {
        Some((group, _version)) => group,
        None => "",
    }
}
