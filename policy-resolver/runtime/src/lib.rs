#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_policy_resolver_core as core;
pub use gateway_policy_resolver_k8s_api as k8s;
pub use gateway_policy_resolver_k8s_index as index;

mod args;
mod manifest;

pub use self::args::Args;
