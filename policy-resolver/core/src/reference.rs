//! Normalization of cross-object references.
//!
//! Gateway API objects refer to one another with loosely-typed references in which the group,
//! kind, and namespace may all be omitted. A [`Resolver`] fills in those gaps so that references
//! can be compared structurally as [`ObjRef`]s.

use crate::{Error, GroupKind, ObjRef, DEFAULT_NAMESPACE, GATEWAY_GROUP};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// A reference to another object as it appears in a resource's spec.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reference {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Resolves [`Reference`]s into canonical [`ObjRef`]s.
///
/// The set of cluster-scoped kinds is fixed for a discovery cycle: it starts with the built-in
/// cluster-scoped kinds and may be extended with kinds whose CRDs declare cluster scope.
#[derive(Clone, Debug)]
pub struct Resolver {
    default_namespace: String,
    cluster_scoped: AHashSet<GroupKind>,
}

// === impl Reference ===

impl Reference {
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: Some(group.into()),
            kind: Some(kind.into()),
            name: Some(name.into()),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Fills in the group and kind implied by the field holding this reference.
    ///
    /// An explicitly empty group is kept as-is, since it names the core API group.
    pub fn or_group_kind(mut self, group: &str, kind: &str) -> Self {
        if self.group.is_none() {
            self.group = Some(group.to_string());
        }
        if self.kind.as_deref().map_or(true, str::is_empty) {
            self.kind = Some(kind.to_string());
        }
        self
    }

    /// A parent reference defaults to a Gateway.
    pub fn parent(self) -> Self {
        self.or_group_kind(GATEWAY_GROUP, "Gateway")
    }

    /// A backend reference defaults to a core Service.
    pub fn backend(self) -> Self {
        self.or_group_kind("", "Service")
    }

    fn group_kind(&self) -> GroupKind {
        let group = match self.group.as_deref() {
            None | Some("core") => "",
            Some(group) => group,
        };
        GroupKind::new(group, self.kind.as_deref().unwrap_or_default())
    }
}

// === impl Resolver ===

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl Resolver {
    pub fn new(default_namespace: impl Into<String>) -> Self {
        let cluster_scoped = [
            GroupKind::new(GATEWAY_GROUP, "GatewayClass"),
            GroupKind::new("", "Namespace"),
        ]
        .into_iter()
        .collect();
        Self {
            default_namespace: default_namespace.into(),
            cluster_scoped,
        }
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Registers an additional kind that is not namespaced.
    pub fn register_cluster_scoped(&mut self, kind: GroupKind) {
        self.cluster_scoped.insert(kind);
    }

    pub fn is_cluster_scoped(&self, kind: &GroupKind) -> bool {
        self.cluster_scoped.contains(kind)
    }

    /// Resolves a reference held by an object in `context_ns`.
    ///
    /// An explicit namespace always wins. Otherwise, cluster-scoped kinds have no namespace and
    /// namespaced kinds default to the referrer's namespace or, failing that, to the default
    /// namespace.
    pub fn resolve(&self, reference: &Reference, context_ns: &str) -> Result<ObjRef, Error> {
        let GroupKind { group, kind } = reference.group_kind();
        let name = match reference.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(Error::missing_name(GroupKind::new(group, kind))),
        };

        let namespace = match reference.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ if self.is_cluster_scoped(&GroupKind::new(group.clone(), kind.clone())) => {
                String::new()
            }
            _ if !context_ns.is_empty() => context_ns.to_string(),
            _ => self.default_namespace.clone(),
        };

        Ok(ObjRef {
            group,
            kind,
            namespace,
            name: name.to_string(),
        })
    }
}
