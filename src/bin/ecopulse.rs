use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ecopulse::app::AppService;
use ecopulse::config::{ConfigLoader, ResolvedConfig};
use ecopulse::curated::CuratedStore;
use ecopulse::error::EcoError;
use ecopulse::export;
use ecopulse::fetch::FetchClient;
use ecopulse::openmeteo::OpenMeteoSource;
use ecopulse::output::{JsonOutput, OutputMode};
use ecopulse::raw_store::RawStore;
use ecopulse::source::SourceRegistry;
use ecopulse::tui::Dashboard;
use ecopulse::wikipedia::WikipediaScraper;
use ecopulse::worldbank::WorldBankSource;

#[derive(Parser)]
#[command(name = "ecopulse")]
#[command(about = "Environment & macroeconomics dashboard with raw landing and a curated store")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run one fetch cycle and print the JSON summary")]
    Fetch,
    #[command(about = "Export a curated fact table as CSV")]
    Export(ExportArgs),
}

#[derive(Args)]
struct ExportArgs {
    #[command(subcommand)]
    table: ExportTable,
}

#[derive(Subcommand)]
enum ExportTable {
    #[command(about = "Hourly environment facts for one location")]
    Env {
        location: String,
        #[arg(long)]
        out: Option<String>,
    },
    #[command(about = "Annual macro facts for one indicator")]
    Macro {
        indicator: String,
        #[arg(long)]
        out: Option<String>,
    },
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(eco) = report.downcast_ref::<EcoError>() {
            return ExitCode::from(map_exit_code(eco));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EcoError) -> u8 {
    match error {
        EcoError::ConfigRead(_)
        | EcoError::ConfigParse(_)
        | EcoError::InvalidLocationKey(_)
        | EcoError::UnknownLocation(_)
        | EcoError::UnknownIndicator(_) => 2,
        EcoError::Schema(_) | EcoError::Sqlite(_) | EcoError::RawStore(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let service = Arc::new(build_service(config)?);

    match cli.command {
        Some(Commands::Fetch) => run_fetch(&service),
        Some(Commands::Export(args)) => run_export(&service, args),
        None => match output_mode {
            OutputMode::Interactive => Dashboard::new(service).run(),
            OutputMode::NonInteractive => run_fetch(&service),
        },
    }
}

fn run_fetch(service: &AppService) -> miette::Result<()> {
    let summary = service.fetch_all(&JsonOutput)?;
    JsonOutput::print_summary(&summary).into_diagnostic()?;
    Ok(())
}

fn build_service(config: ResolvedConfig) -> Result<AppService, EcoError> {
    let client = FetchClient::new(config.request_timeout_secs)?;
    let sources: SourceRegistry = vec![
        Box::new(OpenMeteoSource::new(client.clone(), config.locations.clone())),
        Box::new(WorldBankSource::new(
            client.clone(),
            config.regions.clone(),
            config.macro_indicators.clone(),
        )),
    ];
    let wikipedia = WikipediaScraper::new(client, config.locations.clone())?;
    let raw = RawStore::new(config.data_dir.join("raw"));
    let curated = CuratedStore::open(&config.sqlite_path, &config)?;
    Ok(AppService::new(config, sources, wikipedia, raw, curated))
}

fn run_export(service: &AppService, args: ExportArgs) -> miette::Result<()> {
    match args.table {
        ExportTable::Env { location, out } => {
            if service.config().location(&location).is_none() {
                return Err(EcoError::UnknownLocation(location).into());
            }
            let path = Utf8PathBuf::from(
                out.unwrap_or_else(|| format!("ecopulse_env_{location}.csv")),
            );
            let rows = export::export_env_csv(service.curated(), &location, &path)?;
            println!("wrote {rows} rows to {path}");
            Ok(())
        }
        ExportTable::Macro { indicator, out } => {
            if service.config().macro_indicator(&indicator).is_none() {
                return Err(EcoError::UnknownIndicator(indicator).into());
            }
            let path = Utf8PathBuf::from(
                out.unwrap_or_else(|| format!("ecopulse_macro_{indicator}.csv")),
            );
            let rows = export::export_macro_csv(service.curated(), &indicator, &path)?;
            println!("wrote {rows} rows to {path}");
            Ok(())
        }
    }
}
