use crate::{
    core::{Reference, Resolver, DEFAULT_NAMESPACE, GATEWAY_GROUP, POLICY_LABEL_KEY},
    index::{Config, ResourceModel, Report},
    manifest,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::{io::Write, path::PathBuf, str::FromStr};
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "gateway-policy-resolver",
    about = "Resolves the Gateway API policies in effect for each resource"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway_policy_resolver=info,warn",
        env = "GATEWAY_POLICY_RESOLVER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// Files holding the manifests to resolve. Each may contain several YAML or JSON documents.
    #[clap(long, short = 'f', required = true, num_args = 1..)]
    manifests: Vec<PathBuf>,

    #[clap(long, short = 'o', value_enum, default_value = "yaml")]
    output: OutputFormat,

    /// Describes a single resource, as `Kind[.group]/[namespace/]name`.
    #[clap(long)]
    resource: Option<ResourceSelector>,

    /// The namespace of namespaced resources and references that do not name one.
    #[clap(
        long,
        default_value = DEFAULT_NAMESPACE,
        env = "GATEWAY_POLICY_RESOLVER_DEFAULT_NAMESPACE"
    )]
    default_namespace: String,

    /// The CRD label that marks a kind as a policy and declares its classification.
    #[clap(
        long,
        default_value = POLICY_LABEL_KEY,
        env = "GATEWAY_POLICY_RESOLVER_POLICY_LABEL"
    )]
    policy_label: String,

    /// Lets inherited policies attached to a Namespace flow to the resources in it.
    #[clap(long, env = "GATEWAY_POLICY_RESOLVER_NAMESPACE_ANCESTORS")]
    namespace_ancestors: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

/// Names one resource, filling in the group of well-known kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ResourceSelector(Reference);

impl Args {
    #[inline]
    pub fn parse_and_run() -> Result<()> {
        Self::parse().run()
    }

    pub fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            manifests,
            output,
            resource,
            default_namespace,
            policy_label,
            namespace_ancestors,
        } = self;

        log_format.try_init(log_level)?;

        let config = Config {
            default_namespace,
            policy_label_key: policy_label,
            namespace_ancestors,
        };
        let snapshot = manifest::load(&manifests, &config.policy_label_key)?;
        let model = ResourceModel::discover(&snapshot, &config);

        let resources = match resource {
            Some(ResourceSelector(reference)) => {
                let id = Resolver::new(config.default_namespace.clone())
                    .resolve(&reference, "")
                    .context("invalid resource")?;
                let node = model
                    .policies_for(&id)
                    .ok_or_else(|| anyhow!("{id} not found"))?;
                vec![node]
            }
            None => model.report().resources,
        };
        let report = Report {
            resources,
            diagnostics: model.diagnostics().to_vec(),
        };
        info!(
            resources = report.resources.len(),
            diagnostics = report.diagnostics.len(),
            "resolved policies"
        );

        write(output, &report)
    }
}

fn write<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        }
        OutputFormat::Yaml => serde_yaml::to_writer(&mut stdout, value)?,
    }
    stdout.flush()?;
    Ok(())
}

// === impl ResourceSelector ===

impl FromStr for ResourceSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((kind, rest)) = s.split_once('/') else {
            bail!("resource must be of the form Kind[.group]/[namespace/]name");
        };
        let (namespace, name) = match rest.split_once('/') {
            Some((namespace, name)) => (Some(namespace), name),
            None => (None, rest),
        };
        let (kind, group) = match kind.split_once('.') {
            Some((kind, group)) => (kind, group),
            None => (kind, Self::default_group(kind)),
        };
        if kind.is_empty() || name.is_empty() || name.contains('/') {
            bail!("resource must be of the form Kind[.group]/[namespace/]name");
        }

        let reference = Reference::new(group, kind, name);
        Ok(Self(match namespace {
            Some(namespace) => reference.with_namespace(namespace),
            None => reference,
        }))
    }
}

impl ResourceSelector {
    fn default_group(kind: &str) -> &'static str {
        match kind {
            "GatewayClass" | "Gateway" | "HTTPRoute" => GATEWAY_GROUP,
            _ => "",
        }
    }
}
