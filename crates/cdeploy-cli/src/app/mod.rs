//! command definitions and dispatch.

use anyhow::{anyhow, Context, Result};
use cdeploy_adapter_gcp::{ClientConfig, CloudDeployClient};
use cdeploy_core::{schema, DeliveryPipeline, Target};
use cdeploy_engine::{
    apply, build_plan, delete, delete_all, list_all, load_manifest, ApplyOptions, Lifecycle,
    Manifest, Parent, Resource, ResourceId, ResourcePlan,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// top-level cli definition.
#[derive(Parser)]
#[command(name = "cdeploy")]
#[command(about = "Declarative client for Cloud Deploy delivery pipelines and targets")]
pub(crate) struct Cli {
    /// log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    command: Command,
}

/// cli subcommands.
#[derive(Subcommand)]
enum Command {
    /// load and validate a manifest without calling the api.
    Validate {
        #[arg(short = 'f', long)]
        file: PathBuf,
    },
    /// show what apply would change.
    Plan {
        #[arg(short = 'f', long)]
        file: PathBuf,
        #[command(flatten)]
        connection: Connection,
    },
    /// reconcile every resource in a manifest.
    Apply {
        #[arg(short = 'f', long)]
        file: PathBuf,
        #[command(flatten)]
        connection: Connection,
        #[command(flatten)]
        lifecycle: LifecycleFlags,
    },
    /// list resources of one kind.
    List {
        #[arg(long, value_enum)]
        kind: Kind,
        #[command(flatten)]
        parent: ParentArgs,
        #[command(flatten)]
        connection: Connection,
    },
    /// delete one resource.
    Delete {
        #[arg(long, value_enum)]
        kind: Kind,
        #[command(flatten)]
        parent: ParentArgs,
        #[arg(long)]
        name: String,
        #[command(flatten)]
        connection: Connection,
    },
    /// delete every resource of one kind whose labels match.
    DeleteAll {
        #[arg(long, value_enum)]
        kind: Kind,
        #[command(flatten)]
        parent: ParentArgs,
        /// `key=value`; repeat to require several labels.
        #[arg(long = "label", value_parser = parse_label, required_unless_present = "all")]
        labels: Vec<(String, String)>,
        /// delete every resource under the parent, whatever its labels.
        #[arg(long, conflicts_with = "labels")]
        all: bool,
        #[command(flatten)]
        connection: Connection,
    },
    /// print the field schema as json.
    Schema {
        #[arg(long, value_enum)]
        kind: Option<Kind>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Kind {
    DeliveryPipeline,
    Target,
}

impl Kind {
    fn schema(self) -> &'static cdeploy_core::ResourceSchema {
        match self {
            Kind::DeliveryPipeline => &schema::DELIVERY_PIPELINE,
            Kind::Target => &schema::TARGET,
        }
    }
}

#[derive(Args)]
struct ParentArgs {
    #[arg(long)]
    project: String,
    #[arg(long)]
    location: String,
}

impl ParentArgs {
    fn parent(&self) -> Parent {
        Parent::new(self.project.clone(), self.location.clone())
    }
}

/// where and how to reach the api.
#[derive(Args, Default)]
struct Connection {
    /// yaml file holding a client config.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base_path: Option<String>,
    #[arg(long)]
    access_token: Option<String>,
}

#[derive(Args, Default)]
struct LifecycleFlags {
    #[arg(long, default_value_t = false)]
    block_creation: bool,
    #[arg(long, default_value_t = false)]
    block_acquire: bool,
    #[arg(long, default_value_t = false)]
    block_modification: bool,
}

impl LifecycleFlags {
    fn options(&self) -> ApplyOptions {
        let mut lifecycle = BTreeSet::new();
        for (set, flag) in [
            (self.block_creation, Lifecycle::BlockCreation),
            (self.block_acquire, Lifecycle::BlockAcquire),
            (self.block_modification, Lifecycle::BlockModification),
        ] {
            if set {
                lifecycle.insert(flag);
            }
        }
        ApplyOptions {
            lifecycle,
            state_hint: None,
        }
    }
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Validate { file } => {
            let manifest = load_manifest(&file)?;
            manifest.resources::<Target>()?;
            manifest.resources::<DeliveryPipeline>()?;
            println!("ok");
        }
        Command::Plan { file, connection } => {
            let manifest = load_manifest(&file)?;
            let client = connect(&connection)?;
            let plans = plan_manifest(&client, &manifest).await?;
            println!("{}", serde_json::to_string_pretty(&plans)?);
        }
        Command::Apply {
            file,
            connection,
            lifecycle,
        } => {
            let manifest = load_manifest(&file)?;
            let client = connect(&connection)?;
            let applied = apply_manifest(&client, &manifest, &lifecycle.options()).await?;
            println!("applied {applied} resources");
        }
        Command::List {
            kind,
            parent,
            connection,
        } => {
            let client = connect(&connection)?;
            let parent = parent.parent();
            let listed = match kind {
                Kind::DeliveryPipeline => {
                    serde_json::to_value(list_all::<DeliveryPipeline, _>(&client, &parent).await?)?
                }
                Kind::Target => serde_json::to_value(list_all::<Target, _>(&client, &parent).await?)?,
            };
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
        Command::Delete {
            kind,
            parent,
            name,
            connection,
        } => {
            let client = connect(&connection)?;
            let id = ResourceId::new(parent.project, parent.location, name);
            let options = ApplyOptions::default();
            match kind {
                Kind::DeliveryPipeline => {
                    delete::<DeliveryPipeline, _>(&client, &id, &options).await?
                }
                Kind::Target => delete::<Target, _>(&client, &id, &options).await?,
            }
            println!("deleted {id}");
        }
        Command::DeleteAll {
            kind,
            parent,
            labels,
            all: _,
            connection,
        } => {
            let client = connect(&connection)?;
            let parent = parent.parent();
            let labels: BTreeMap<_, _> = labels.into_iter().collect();
            let deleted = match kind {
                Kind::DeliveryPipeline => {
                    delete_all(&client, &parent, |item: &DeliveryPipeline| {
                        labels_match(item, &labels)
                    })
                    .await?
                }
                Kind::Target => {
                    delete_all(&client, &parent, |item: &Target| labels_match(item, &labels))
                        .await?
                }
            };
            println!("deleted {deleted} resources");
        }
        Command::Schema { kind } => {
            let schemas: Vec<_> = match kind {
                Some(kind) => vec![kind.schema()],
                None => schema::all().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&schemas)?);
        }
    }

    Ok(())
}

/// build a client from a config file, the environment and flags, in that order.
fn connect(connection: &Connection) -> Result<CloudDeployClient> {
    let file = match &connection.config {
        Some(path) => Some(read_config(path)?),
        None => None,
    };
    let config = resolve_config(file, |key| std::env::var(key).ok(), connection)?;
    Ok(CloudDeployClient::new(config)?)
}

fn read_config(path: &Path) -> Result<ClientConfig> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))
}

fn resolve_config(
    file: Option<ClientConfig>,
    env: impl Fn(&str) -> Option<String>,
    connection: &Connection,
) -> Result<ClientConfig> {
    let mut config = file.unwrap_or_default();
    if let Some(base_path) = env("CDEPLOY_BASE_PATH") {
        config.base_path = base_path;
    }
    if let Some(token) = env("CDEPLOY_ACCESS_TOKEN") {
        config.access_token = Some(token);
    }
    if let Some(base_path) = &connection.base_path {
        config.base_path = base_path.clone();
    }
    if let Some(token) = &connection.access_token {
        config.access_token = Some(token.clone());
    }
    if config.access_token.is_none() {
        return Err(anyhow!("missing --access-token or CDEPLOY_ACCESS_TOKEN"));
    }
    Ok(config)
}

fn parse_label(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw}")),
    }
}

fn labels_match<R: Resource>(item: &R, wanted: &BTreeMap<String, String>) -> bool {
    wanted.iter().all(|(key, value)| {
        item.labels()
            .and_then(|labels| labels.get(key))
            .is_some_and(|actual| actual == value)
    })
}

/// plans for every resource in the manifest, targets first.
async fn plan_manifest(client: &CloudDeployClient, manifest: &Manifest) -> Result<Vec<ResourcePlan>> {
    let options = ApplyOptions::default();
    let mut plans = Vec::new();
    for target in manifest.resources::<Target>()? {
        plans.push(plan_one(client, &target, &options).await?);
    }
    for pipeline in manifest.resources::<DeliveryPipeline>()? {
        plans.push(plan_one(client, &pipeline, &options).await?);
    }
    Ok(plans)
}

async fn plan_one<R: Resource>(
    client: &CloudDeployClient,
    desired: &R,
    options: &ApplyOptions,
) -> Result<ResourcePlan> {
    build_plan(client, desired, options)
        .await
        .with_context(|| describe(desired))
}

/// apply targets before the pipelines that reference them.
async fn apply_manifest(
    client: &CloudDeployClient,
    manifest: &Manifest,
    options: &ApplyOptions,
) -> Result<usize> {
    let mut applied = 0;
    for target in manifest.resources::<Target>()? {
        apply_one(client, &target, options).await?;
        applied += 1;
    }
    for pipeline in manifest.resources::<DeliveryPipeline>()? {
        apply_one(client, &pipeline, options).await?;
        applied += 1;
    }
    Ok(applied)
}

async fn apply_one<R: Resource>(
    client: &CloudDeployClient,
    desired: &R,
    options: &ApplyOptions,
) -> Result<()> {
    apply(client, desired, options)
        .await
        .with_context(|| describe(desired))?;
    info!(resource = %describe(desired), "applied");
    Ok(())
}

fn describe<R: Resource>(resource: &R) -> String {
    match resource.id() {
        Some(id) => format!("{} {id}", R::schema().kind),
        None => R::schema().kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdeploy_engine::PlanAction;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"project: p
location: l
targets:
  - name: prod
    requireApproval: true
    run:
      location: projects/p/locations/l
deliveryPipelines:
  - name: web
    serialPipeline:
      stages:
        - targetId: prod
"#;

    fn write_manifest(dir: &Path) -> PathBuf {
        let path = dir.join("cdeploy.yaml");
        fs::write(&path, MANIFEST).unwrap();
        path
    }

    fn test_client(server: &MockServer) -> CloudDeployClient {
        let connection = Connection {
            base_path: Some(server.url("/v1/")),
            access_token: Some("token".to_string()),
            ..Default::default()
        };
        connect(&connection).unwrap()
    }

    #[test]
    fn parses_apply_with_lifecycle_flags() {
        let cli = Cli::try_parse_from([
            "cdeploy",
            "apply",
            "-f",
            "cdeploy.yaml",
            "--block-creation",
            "--access-token",
            "t",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Apply { lifecycle, .. } = cli.command else {
            panic!("expected apply");
        };
        let options = lifecycle.options();
        assert!(options.blocks(Lifecycle::BlockCreation));
        assert!(!options.blocks(Lifecycle::BlockModification));
    }

    #[test]
    fn parses_repeated_labels() {
        let cli = Cli::try_parse_from([
            "cdeploy",
            "delete-all",
            "--kind",
            "target",
            "--project",
            "p",
            "--location",
            "l",
            "--label",
            "team=a",
            "--label",
            "env=dev",
        ])
        .unwrap();
        let Command::DeleteAll { kind, labels, .. } = cli.command else {
            panic!("expected delete-all");
        };
        assert_eq!(kind, Kind::Target);
        assert_eq!(labels.len(), 2);
        assert!(parse_label("novalue").is_err());
    }

    #[test]
    fn delete_all_needs_a_label_or_all() {
        let base = [
            "cdeploy",
            "delete-all",
            "--kind",
            "target",
            "--project",
            "p",
            "--location",
            "l",
        ];
        assert!(Cli::try_parse_from(base).is_err());
        assert!(Cli::try_parse_from(base.iter().chain(&["--all", "--label", "team=a"])).is_err());

        let cli = Cli::try_parse_from(base.iter().chain(&["--all"])).unwrap();
        let Command::DeleteAll { all, labels, .. } = cli.command else {
            panic!("expected delete-all");
        };
        assert!(all);
        assert!(labels.is_empty());
    }

    #[test]
    fn flags_override_env_override_file() {
        let file = ClientConfig {
            base_path: "http://file/".to_string(),
            access_token: Some("file-token".to_string()),
            conflict_retries: 7,
            ..Default::default()
        };
        let env = |key: &str| match key {
            "CDEPLOY_ACCESS_TOKEN" => Some("env-token".to_string()),
            _ => None,
        };
        let connection = Connection {
            base_path: Some("http://flag/".to_string()),
            ..Default::default()
        };
        let config = resolve_config(Some(file), env, &connection).unwrap();
        assert_eq!(config.base_path, "http://flag/");
        assert_eq!(config.access_token.as_deref(), Some("env-token"));
        assert_eq!(config.conflict_retries, 7);
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = resolve_config(None, |_| None, &Connection::default()).unwrap_err();
        assert!(err.to_string().contains("CDEPLOY_ACCESS_TOKEN"));
    }

    #[test]
    fn reads_yaml_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "base_path: http://localhost:9/v1/\noperation_timeout_secs: 30\n").unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.base_path, "http://localhost:9/v1/");
        assert_eq!(config.operation_timeout_secs, 30);
    }

    #[test]
    fn label_filter_requires_every_label() {
        let mut target = Target::new("p", "l", "prod");
        target.labels = cdeploy_core::Field::Value(BTreeMap::from([
            ("team".to_string(), "a".to_string()),
            ("env".to_string(), "dev".to_string()),
        ]));
        let wanted = BTreeMap::from([("team".to_string(), "a".to_string())]);
        assert!(labels_match(&target, &wanted));
        let wanted = BTreeMap::from([("team".to_string(), "b".to_string())]);
        assert!(!labels_match(&target, &wanted));
        assert!(labels_match(&target, &BTreeMap::new()));
    }

    #[tokio::test]
    async fn validate_accepts_manifest() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path());
        let cli = Cli::try_parse_from(["cdeploy", "validate", "-f", path.to_str().unwrap()]).unwrap();
        run(cli).await.unwrap();
    }

    #[tokio::test]
    async fn plan_reports_create_for_missing_resources() {
        let server = MockServer::start();
        let target = server.mock(|when, then| {
            when.method(GET).path("/v1/projects/p/locations/l/targets/prod");
            then.status(404);
        });
        let pipeline = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/projects/p/locations/l/deliveryPipelines/web");
            then.status(200).json_body(json!({
                "name": "projects/p/locations/l/deliveryPipelines/web",
                "serialPipeline": {"stages": [{"targetId": "prod"}]},
                "condition": {"pipelineReadyCondition": {"status": true}}
            }));
        });

        let dir = tempdir().unwrap();
        let manifest = load_manifest(write_manifest(dir.path())).unwrap();
        let plans = plan_manifest(&test_client(&server), &manifest)
            .await
            .unwrap();

        target.assert();
        pipeline.assert();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].action, PlanAction::Create);
        assert_eq!(plans[1].action, PlanAction::NoChange);
    }
}
