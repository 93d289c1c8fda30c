#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Core types for resolving Gateway API policy attachment.
//!
//! Resources are identified by [`ObjRef`]s, which are produced by normalizing loosely-typed
//! cross-object references through a [`Resolver`]. Policy documents are schema-less and modeled as
//! [`Fields`]; the override/default merge law lives in [`merge`].

mod error;
pub mod merge;
mod obj_ref;
pub mod policy;
pub mod reference;

pub use self::{
    error::Error,
    merge::{Candidate, EffectivePolicies, EffectivePolicy},
    obj_ref::{GroupKind, ObjRef},
    policy::{Classification, Fields, Overlay, PolicyBody, PolicyInstance, PolicyKindDescriptor},
    reference::{Reference, Resolver},
};

/// The API group of the Gateway API resources.
pub const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";

/// The namespace used when neither a reference nor its referrer names one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The CRD label that declares a policy kind's attachment semantics.
pub const POLICY_LABEL_KEY: &str = "gateway.networking.k8s.io/policy";
