#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

fn main() -> anyhow::Result<()> {
    gateway_policy_resolver_runtime::Args::parse_and_run()
}
