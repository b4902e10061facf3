use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nova_classfile::{MethodBody, MethodHandle};
use nova_classpath::{ClassBytesCache, Classpath};
use nova_config::{ConfigDiagnostics, NovaConfig};
use nova_return_infer::{Analysis, ReturnSite, ReturnTypeAnalyzer};
use nova_types_signature::TypeDescriptor;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "nova",
    version,
    about = "Nova CLI (return-type inference for compiled JVM methods)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Infer the concrete return type of a compiled method
    Infer(MethodArgs),
    /// Print a method's instructions and how each return site was classified
    Dump(MethodArgs),
    /// Print the JSON schema for `nova.toml`
    ConfigSchema,
}

#[derive(Args)]
struct MethodArgs {
    /// Binary name of the declaring class (`com.example.Routes`)
    #[arg(long = "class")]
    class: String,
    /// Method name (`lambda$main$0`)
    #[arg(long)]
    method: String,
    /// Erased method descriptor (`()Ljava/lang/Object;`)
    #[arg(long)]
    descriptor: String,
    /// Class directory, jar or jmod; searched before the configured classpath
    #[arg(long = "classpath", value_name = "PATH")]
    classpath: Vec<PathBuf>,
    /// Config file (defaults to `NOVA_CONFIG_PATH`, then `nova.toml` in the current directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

impl MethodArgs {
    fn handle(&self) -> MethodHandle {
        MethodHandle::new(
            self.class.replace('/', "."),
            self.method.clone(),
            self.descriptor.clone(),
        )
    }
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Infer(args) => {
            let session = Session::open(&args)?;
            let handle = args.handle();
            let analysis = session.analyzer.analyze_method(&handle)?;
            let exit = match &analysis {
                Analysis::Inferred(_) => 0,
                Analysis::NotFound | Analysis::Unresolved => 1,
            };
            print_analysis(&handle, &analysis, args.json)?;
            Ok(exit)
        }
        Command::Dump(args) => {
            let session = Session::open(&args)?;
            let handle = args.handle();
            let Some(body) = session.analyzer.find_method_body(&handle)? else {
                eprintln!("method not found: {handle}");
                return Ok(1);
            };
            print_dump(&session, &body, args.json)?;
            Ok(0)
        }
        Command::ConfigSchema => {
            let schema = nova_config::json_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(0)
        }
    }
}

type Analyzer = ReturnTypeAnalyzer<Classpath, nova_types::ChainTypeLoader<'static>>;

struct Session {
    analyzer: Analyzer,
}

impl Session {
    fn open(args: &MethodArgs) -> Result<Self> {
        let (config, config_path, diagnostics) = load_config(args.config.as_deref())?;
        nova_config::init_tracing(&config.logging);
        report_diagnostics(config_path.as_deref(), &diagnostics);

        let mut entries = args.classpath.clone();
        if let Some(config_dir) = config_path.as_deref().and_then(Path::parent) {
            entries.extend(config.classpath_entries(config_dir));
        } else {
            entries.extend(config.classpath.iter().cloned());
        }
        if entries.is_empty() {
            anyhow::bail!("no classpath: pass --classpath or set `classpath` in nova.toml");
        }
        tracing::debug!(target: "nova.cli", entries = entries.len(), "opening classpath");

        let cache = Arc::new(ClassBytesCache::new(Classpath::from_paths(entries)));
        let analyzer = ReturnTypeAnalyzer::over_classpath(cache, config.inference.skip_list());
        Ok(Self { analyzer })
    }
}

fn load_config(
    explicit: Option<&Path>,
) -> Result<(NovaConfig, Option<PathBuf>, ConfigDiagnostics)> {
    if let Some(path) = explicit {
        let (config, diagnostics) = NovaConfig::load_from_path_with_diagnostics(path)
            .with_context(|| format!("loading {}", path.display()))?;
        return Ok((config, Some(path.to_path_buf()), diagnostics));
    }

    let cwd = std::env::current_dir().context("reading current directory")?;
    Ok(nova_config::load_for_root_with_diagnostics(&cwd)?)
}

fn report_diagnostics(path: Option<&Path>, diagnostics: &ConfigDiagnostics) {
    let path = path.map(|p| p.display().to_string()).unwrap_or_default();
    for key in &diagnostics.unknown_keys {
        eprintln!("warning: {path}: unknown key `{key}`");
    }
    for warning in &diagnostics.warnings {
        eprintln!("warning: {path}: {warning}");
    }
    for error in &diagnostics.errors {
        eprintln!("error: {path}: {error}");
    }
}

#[derive(Serialize)]
struct AnalysisReport {
    method: String,
    status: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    descriptor: Option<String>,
}

impl AnalysisReport {
    fn new(handle: &MethodHandle, analysis: &Analysis) -> Self {
        let status = match analysis {
            Analysis::Inferred(_) => "inferred",
            Analysis::NotFound => "not_found",
            Analysis::Unresolved => "unresolved",
        };
        let inferred = analysis.inferred();
        Self {
            method: handle.to_string(),
            status,
            ty: inferred.map(TypeDescriptor::to_string),
            descriptor: inferred.map(TypeDescriptor::to_descriptor),
        }
    }
}

fn print_analysis(handle: &MethodHandle, analysis: &Analysis, json: bool) -> Result<()> {
    if json {
        let report = AnalysisReport::new(handle, analysis);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match analysis {
        Analysis::Inferred(ty) => println!("{ty}"),
        Analysis::NotFound => eprintln!("method not found: {handle}"),
        Analysis::Unresolved => eprintln!("unresolved: {handle}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct SiteReport {
    offset: u32,
    producer: Option<String>,
    kind: Option<&'static str>,
    contribution: Option<String>,
}

#[derive(Serialize)]
struct DumpReport {
    method: String,
    sites: Vec<SiteReport>,
    inferred: String,
}

fn site_report(body: &MethodBody, site: &ReturnSite) -> SiteReport {
    let nodes = &body.instructions;
    SiteReport {
        offset: nodes.node(site.site).offset,
        producer: site.producer.map(|id| nodes.node(id).insn.to_string()),
        kind: site.kind.map(|kind| kind.as_str()),
        contribution: site.contribution.as_ref().map(TypeDescriptor::to_string),
    }
}

fn print_dump(session: &Session, body: &MethodBody, json: bool) -> Result<()> {
    let inference = session.analyzer.inference();
    let sites: Vec<SiteReport> = inference
        .return_sites(body)
        .iter()
        .map(|site| site_report(body, site))
        .collect();
    let inferred = inference.infer(body).to_string();

    if json {
        let report = DumpReport {
            method: body.handle.to_string(),
            sites,
            inferred,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print!("{}", body.trace());
    println!("returns:");
    for site in &sites {
        println!(
            "  {:>4}: {} [{}] -> {}",
            site.offset,
            site.producer.as_deref().unwrap_or("(none)"),
            site.kind.unwrap_or("unrecognized"),
            site.contribution.as_deref().unwrap_or("(dropped)"),
        );
    }
    println!("inferred: {inferred}");
    Ok(())
}
