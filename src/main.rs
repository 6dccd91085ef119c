use bundlesmith_core::format_error;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "bundlesmith")]
#[command(about = "Incremental, content-addressed bundle release builder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and publish the next release of a bundle
    Build {
        /// State directory holding the published releases (www/update)
        statedir: PathBuf,
        /// Content tree of the bundle
        chrootdir: PathBuf,
        /// Bundle configuration file (TOML)
        config: PathBuf,
    },
    /// Parse a manifest file and report its contents
    Check {
        /// Path to a Manifest.<name> file
        manifest: PathBuf,
        /// Fail when the file is not in canonical form
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            statedir,
            chrootdir,
            config,
        } => cli::build::run(&statedir, &chrootdir, &config).await,
        Commands::Check { manifest, strict } => cli::check::run(&manifest, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{}", format_error(&e));
            ExitCode::FAILURE
        }
    }
}
