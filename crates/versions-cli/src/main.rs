//! Versions CLI
//!
//! Command-line interface over a demo `documents` table whose content lives
//! in versioned `document_versions` rows.

use clap::{Parser, Subcommand};
use versions_core::logging_facility::{self, Profile};

mod commands;
mod context;
mod render;

#[derive(Debug, Parser)]
#[command(name = "versions")]
#[command(about = "Versions - clone-on-change document history", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: context::GlobalArgs,

    /// Log output on stderr (dev or json); silent when omitted
    #[arg(long, global = true, env = "VERSIONS_LOG")]
    log: Option<Profile>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the database, attachment root and schema
    Init,
    /// Create a document with its first version
    Create(commands::write::CreateArgs),
    /// Change a document; content changes fork a new version
    Update(commands::write::UpdateArgs),
    /// Show a document and its current version
    Show(commands::DocumentArg),
    /// List every version of a document, newest first
    History(commands::DocumentArg),
    /// Destroy the current version; the last one takes the document with it
    DropVersion(commands::DocumentArg),
    /// Destroy a document and all of its versions
    Destroy(commands::DocumentArg),
    /// Print the current version's file to stdout
    Cat(commands::DocumentArg),
}

fn main() {
    let cli = Cli::parse();

    if let Some(profile) = cli.log {
        logging_facility::init(profile);
    }

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli.global),
        Commands::Create(args) => commands::write::create(&cli.global, args),
        Commands::Update(args) => commands::write::update(&cli.global, args),
        Commands::Show(args) => commands::read::show(&cli.global, args),
        Commands::History(args) => commands::read::history(&cli.global, args),
        Commands::DropVersion(args) => commands::remove::drop_version(&cli.global, args),
        Commands::Destroy(args) => commands::remove::destroy(&cli.global, args),
        Commands::Cat(args) => commands::read::cat(&cli.global, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
