use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use protogen_assembly::{RunConfig, run};
use protogen_reference::IndexBuilder;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "protogen")]
#[command(about = "Assemble generated FHIR proto packages into deterministic archives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate the proto package archive for an input package.
    Generate(GenerateArgs),
    /// Write a run configuration YAML file from flags.
    InitConfig(InitConfigArgs),
    /// Load a baseline reference index and summarize it.
    Reference(ReferenceArgs),
}

/// Run settings shared by `generate` and `init-config`. Flags override values
/// loaded from `--config`.
#[derive(Debug, Args)]
struct RunArgs {
    /// YAML run configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory in the source tree for the generated files; the archive is
    /// written here.
    #[arg(long)]
    output_directory: Option<PathBuf>,
    /// Input package directory or JSON file.
    #[arg(long)]
    input_package: Option<PathBuf>,
    /// Proto package for generated messages.
    #[arg(long)]
    proto_package: Option<String>,
    /// Java package for generated messages.
    #[arg(long)]
    java_proto_package: Option<String>,
    /// Date used in the license header.
    #[arg(long)]
    license_date: Option<String>,
    /// Tag offset for contained-resource fields.
    #[arg(long)]
    contained_resource_offset: Option<u32>,
    /// Align field tags with the baseline version (`--legacy-retagging=false`
    /// turns off a value from `--config`).
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    legacy_retagging: Option<bool>,
    /// Baseline descriptor directory or bundle file (repeatable; all are
    /// loaded and merged).
    #[arg(long = "reference")]
    references: Vec<PathBuf>,
    /// Version token of the baseline package.
    #[arg(long)]
    baseline_token: Option<String>,
    /// Archive file name inside the output directory.
    #[arg(long)]
    archive_name: Option<String>,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[command(flatten)]
    run: RunArgs,
    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    #[command(flatten)]
    run: RunArgs,
    /// Path of the YAML file to write.
    #[arg(long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct ReferenceArgs {
    /// Baseline descriptor directories or bundle files, merged in order.
    #[arg(required = true)]
    sources: Vec<PathBuf>,
    /// List every indexed message name.
    #[arg(long)]
    list: bool,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::InitConfig(args) => run_init_config(args),
        Command::Reference(args) => run_reference(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_generate(args: GenerateArgs) -> Result<(), String> {
    let config = resolve_config(args.run)?;
    let summary = run(&config).map_err(|err| err.to_string())?;

    if args.json {
        let value = serde_json::json!({
            "archive": summary.archive_path,
            "files": summary.files,
            "messages": summary.messages,
            "entries": summary.archive.entries,
            "sha256": summary.archive.sha256,
            "retagged_fields": summary.stabilized.map(|s| s.retagged_fields),
        });
        let text = serde_json::to_string_pretty(&value)
            .map_err(|err| format!("Failed to serialize summary: {err}"))?;
        println!("{text}");
    } else {
        println!(
            "Wrote {} files ({} messages) to {}",
            summary.files,
            summary.messages,
            summary.archive_path.display()
        );
    }
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    let config = resolve_config(args.run)?;
    config.save(&args.output).map_err(|err| {
        format!(
            "Failed to write config '{}': {err}",
            args.output.display()
        )
    })?;
    println!("Wrote {}", args.output.display());
    Ok(())
}

fn run_reference(args: ReferenceArgs) -> Result<(), String> {
    let index = args
        .sources
        .iter()
        .fold(IndexBuilder::new(), |builder, path| builder.from_path(path))
        .build()
        .map_err(|err| format!("Failed to load reference index: {err}"))?;

    println!("{} reference messages", index.len());
    if args.list {
        for name in index.names() {
            println!("{name}");
        }
    }
    Ok(())
}

/// Merges the config file (if any) with flag overrides and checks that the
/// required settings are present.
fn resolve_config(args: RunArgs) -> Result<RunConfig, String> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => RunConfig::new(
            required(args.output_directory.clone(), "--output-directory")?,
            required(args.input_package.clone(), "--input-package")?,
            &required(args.proto_package.clone(), "--proto-package")?,
            &required(args.java_proto_package.clone(), "--java-proto-package")?,
        ),
    };

    if let Some(output_directory) = args.output_directory {
        config.output_directory = output_directory;
    }
    if let Some(input_package) = args.input_package {
        config.input_package = input_package;
    }
    if let Some(proto_package) = args.proto_package {
        config.proto_package = proto_package;
    }
    if let Some(java_proto_package) = args.java_proto_package {
        config.java_proto_package = java_proto_package;
    }
    if let Some(license_date) = args.license_date {
        config.license_date = license_date;
    }
    if let Some(offset) = args.contained_resource_offset {
        config.contained_resource_offset = offset;
    }
    if let Some(legacy_retagging) = args.legacy_retagging {
        config.legacy_retagging = legacy_retagging;
    }
    if !args.references.is_empty() {
        config.retagging.reference_sources = args.references;
    }
    if let Some(token) = args.baseline_token {
        config.retagging.baseline_token = token;
    }
    if let Some(archive_name) = args.archive_name {
        config.archive_name = archive_name;
    }

    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("{flag} is required when --config is not given"))
}
