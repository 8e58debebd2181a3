//! Point d'entrée CLI pour carto-ouvrages

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use carto_ouvrages::cli::{self, Commands, GenerateArgs};

/// `.env` du répertoire courant, sinon celui placé à côté du binaire
fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    let beside_binary = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")));
    if let Some(path) = beside_binary {
        let _ = dotenvy::from_path(path);
    }
}

/// Générer la carte interactive des ouvrages d'eau et d'assainissement
#[derive(Parser)]
#[command(name = "carto-ouvrages")]
#[command(author, version)]
#[command(about = "Générer la carte Leaflet des ouvrages (défaut) ou inspecter les données")]
#[command(long_about = "Assemble les contours communaux, les ouvrages et les types d'ouvrage en une page HTML Leaflet autonome.\n\nPar défaut, génère la carte. Utilisez 'inspect' pour diagnostiquer les données sans rendu.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: generate)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments de génération (commande par défaut)
    #[command(flatten)]
    generate: Option<GenerateArgs>,
}

fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Generate(args)) => cli::cmd_generate(&args),
        Some(Commands::Inspect(args)) => cli::cmd_inspect(&args),
        Some(Commands::Types(args)) => cli::cmd_types(&args),
        None => cli::cmd_generate(&cli.generate.unwrap_or_default()),
    }
}

/// Niveau issu de -q / -v, affiné par RUST_LOG. Les journaux vont sur
/// stderr ; stdout ne reçoit que le chemin de la carte.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
