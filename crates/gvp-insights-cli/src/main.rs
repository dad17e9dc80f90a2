use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gvp_insights_core::{
    build_dashboard, map_points, parse_dataset, region_options, table_rows, InsightsConfig,
    Record, RecordFilter, RecordKind, TaxonomyTable,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const LOG_ENV: &str = "GVP_LOG";

#[derive(Debug, Parser)]
#[command(name = "gvp")]
#[command(about = "Garbage Vulnerable Point survey insights")]
struct Cli {
    /// Field names, flag groups and taxonomies (.yaml/.yml or .json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Summary(FilterArgs),
    Table(FilterArgs),
    Map(FilterArgs),
    Regions(DataArgs),
    Classify(ClassifyArgs),
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Args)]
struct DataArgs {
    #[arg(long)]
    data: PathBuf,
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[command(flatten)]
    source: DataArgs,
    #[arg(long)]
    region: Option<String>,
    /// `gvp` or `other`.
    #[arg(long, value_parser = parse_record_kind)]
    kind: Option<RecordKind>,
    #[arg(long)]
    record: Option<usize>,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    #[arg(long, value_enum)]
    domain: DomainArg,
    #[arg(long = "text", required = true)]
    texts: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Show(ConfigShowArgs),
    Check,
}

#[derive(Debug, Args)]
struct ConfigShowArgs {
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    format: FormatArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DomainArg {
    Disposal,
    Setting,
    Solution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Json,
    Yaml,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn parse_record_kind(value: &str) -> Result<RecordKind, String> {
    RecordKind::parse(&value.trim().to_ascii_lowercase()).ok_or_else(|| {
        format!("expected `{}` or `{}`", RecordKind::Gvp.as_str(), RecordKind::Other.as_str())
    })
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Summary(args) => run_summary(&args, &config),
        Command::Table(args) => run_table(&args, &config),
        Command::Map(args) => run_map(&args, &config),
        Command::Regions(args) => run_regions(&args, &config),
        Command::Classify(args) => run_classify(&args, &config),
        Command::Config { command } => run_config(&command, &config),
    }
}

fn load_config(path: Option<&Path>) -> Result<InsightsConfig> {
    let Some(path) = path else {
        return Ok(InsightsConfig::default());
    };

    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    let config: InsightsConfig = if is_yaml(path) {
        serde_yaml::from_str(&body)
            .with_context(|| format!("failed to parse YAML configuration {}", path.display()))?
    } else {
        serde_json::from_str(&body)
            .with_context(|| format!("failed to parse JSON configuration {}", path.display()))?
    };
    config.validate().with_context(|| format!("invalid configuration {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| matches!(extension, "yaml" | "yml"))
}

fn load_dataset(args: &DataArgs) -> Result<Vec<Record>> {
    let body = fs::read_to_string(&args.data)
        .with_context(|| format!("failed to read dataset {}", args.data.display()))?;
    let records = parse_dataset(&body)
        .with_context(|| format!("failed to load dataset {}", args.data.display()))?;
    tracing::info!(path = %args.data.display(), records = records.len(), "loaded dataset");
    Ok(records)
}

fn build_filter(args: &FilterArgs, records: &[Record]) -> RecordFilter {
    if let Some(index) = args.record {
        if index >= records.len() {
            tracing::warn!(index, available = records.len(), "selected record is out of range");
        }
    }
    RecordFilter {
        region: args.region.clone(),
        kind: args.kind,
        record: args.record,
    }
}

fn run_summary(args: &FilterArgs, config: &InsightsConfig) -> Result<()> {
    let records = load_dataset(&args.source)?;
    let filter = build_filter(args, &records);
    let summary = build_dashboard(&records, &filter, config);
    emit_json(serde_json::json!({
        "filter": serde_json::to_value(&filter)?,
        "summary": serde_json::to_value(&summary)?
    }))
}

fn run_table(args: &FilterArgs, config: &InsightsConfig) -> Result<()> {
    let records = load_dataset(&args.source)?;
    let filter = build_filter(args, &records);
    let rows = table_rows(&records, &filter, config);
    emit_json(serde_json::json!({
        "filter": serde_json::to_value(&filter)?,
        "rows": serde_json::to_value(&rows)?
    }))
}

fn run_map(args: &FilterArgs, config: &InsightsConfig) -> Result<()> {
    let records = load_dataset(&args.source)?;
    let filter = build_filter(args, &records);
    let points = map_points(&records, &filter, config);
    emit_json(serde_json::json!({
        "filter": serde_json::to_value(&filter)?,
        "points": serde_json::to_value(&points)?
    }))
}

fn run_regions(args: &DataArgs, config: &InsightsConfig) -> Result<()> {
    let records = load_dataset(args)?;
    emit_json(serde_json::json!({
        "regions": region_options(&records, &config.fields)
    }))
}

fn run_classify(args: &ClassifyArgs, config: &InsightsConfig) -> Result<()> {
    let table = args.domain.table(config);
    let results: Vec<Value> = args
        .texts
        .iter()
        .map(|text| {
            serde_json::json!({
                "text": text,
                "category": table.classify(text)
            })
        })
        .collect();
    emit_json(serde_json::json!({
        "taxonomy": table.name,
        "results": results
    }))
}

fn run_config(command: &ConfigCommand, config: &InsightsConfig) -> Result<()> {
    match command {
        ConfigCommand::Show(args) => {
            if args.format == FormatArg::Yaml {
                let rendered =
                    serde_yaml::to_string(config).context("failed to render configuration")?;
                print!("{rendered}");
                return Ok(());
            }
            emit_json(serde_json::json!({ "config": serde_json::to_value(config)? }))
        }
        ConfigCommand::Check => emit_json(serde_json::json!({
            "valid": true,
            "top_n": config.top_n,
            "taxonomies": [
                { "name": config.disposal.name, "entries": config.disposal.entries.len() },
                { "name": config.setting.name, "entries": config.setting.entries.len() },
                { "name": config.solutions.name, "entries": config.solutions.entries.len() }
            ]
        })),
    }
}

impl DomainArg {
    fn table(self, config: &InsightsConfig) -> &TaxonomyTable {
        match self {
            Self::Disposal => &config.disposal,
            Self::Setting => &config.setting,
            Self::Solution => &config.solutions,
        }
    }
}
