//! Classification of policy kinds.

use crate::Diagnostic;
use gateway_policy_resolver_core::{
    Classification, Error, GroupKind, ObjRef, PolicyKindDescriptor,
};
use gateway_policy_resolver_k8s_api::crd::{self, CustomResourceDefinition};
use std::collections::BTreeMap;

/// The policy kinds known to a discovery cycle.
///
/// Only CRDs that carry the policy label are policy kinds. Kinds whose label value is not
/// recognized are retained as [`Classification::Unknown`] so that they can be reported, but they
/// are never matched or merged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Descriptors(BTreeMap<GroupKind, PolicyKindDescriptor>);

impl Descriptors {
    pub fn classify(
        crds: &[CustomResourceDefinition],
        label_key: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut descriptors = BTreeMap::new();
        for crd in crds {
            // CRDs without the label at all are not policies.
            let Some(label) = crd::label(crd, label_key) else {
                continue;
            };

            let kind = crd::group_kind(crd);
            let classification = Classification::from_label(Some(label));
            if classification == Classification::Unknown {
                tracing::warn!(%kind, %label, "ignoring policy kind with unknown classification");
                diagnostics.push(Diagnostic::new(
                    ObjRef::cluster(
                        "apiextensions.k8s.io",
                        "CustomResourceDefinition",
                        crd.metadata.name.clone().unwrap_or_default(),
                    ),
                    Error::UnknownPolicyClassification {
                        kind: kind.clone(),
                        label: Some(label.to_string()),
                    },
                ));
            } else {
                tracing::debug!(%kind, ?classification, "classified policy kind");
            }

            descriptors.insert(
                kind.clone(),
                PolicyKindDescriptor {
                    kind,
                    classification,
                },
            );
        }
        Self(descriptors)
    }

    pub fn get(&self, kind: &GroupKind) -> Option<&PolicyKindDescriptor> {
        self.0.get(kind)
    }

    pub fn classification(&self, kind: &GroupKind) -> Option<Classification> {
        self.get(kind).map(|d| d.classification)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolicyKindDescriptor> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PolicyKindDescriptor> for Descriptors {
    fn from_iter<T: IntoIterator<Item = PolicyKindDescriptor>>(iter: T) -> Self {
        Self(iter.into_iter().map(|d| (d.kind.clone(), d)).collect())
    }
}
