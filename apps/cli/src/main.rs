mod commands;

use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wishlist")]
#[command(about = "Keep a community weapon-roll wish list in sync", version)]
struct Cli {
    #[arg(long, global = true, value_hint = ValueHint::FilePath, help = "Path of the saved state file")]
    state: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Show every sync stage and debug logs")]
    verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose", help = "Only print errors")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch and load a wish list from a URL")]
    Update(UpdateArgs),
    #[command(about = "Load a wish list from a local file")]
    Import {
        #[arg(help = "Wish list file to read", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, help = "Source label to record instead of the file path")]
        label: Option<String>,
    },
    #[command(about = "Clear the active wish list, keeping its source")]
    Clear,
    #[command(about = "Show the active wish list")]
    Status,
    #[command(about = "Check whether a URL is an allowed wish list source")]
    Check {
        #[arg(help = "Candidate source URL")]
        url: String,
    },
    #[command(about = "Write the active wish list in the text format")]
    Export {
        #[arg(help = "Output file (stdout when omitted)", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    #[command(about = "Print the connect-src directive for the allowed sources")]
    Csp,
}

#[derive(Args)]
struct UpdateArgs {
    #[arg(help = "Wish list URL (defaults to the saved source)")]
    url: Option<String>,
    #[arg(long, conflicts_with_all = ["url", "choosy_voltron"], help = "Use the Voltron community list")]
    voltron: bool,
    #[arg(long, conflicts_with = "url", help = "Use the Choosy Voltron community list")]
    choosy_voltron: bool,
    #[arg(long, help = "Retries for recoverable fetch failures")]
    retries: Option<usize>,
    #[arg(
        long,
        conflicts_with_all = ["url", "voltron", "choosy_voltron"],
        help = "Only fetch when the saved list is older than the maximum age"
    )]
    if_stale: bool,
    #[arg(long, value_name = "HOURS", requires = "if_stale", help = "Maximum age for --if-stale")]
    max_age: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else if cli.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
