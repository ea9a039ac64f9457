mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use docgrid_core::model::DocType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "docgrid",
    version,
    about = "Extract specification and invoice tables from PDFs into spreadsheets and databases"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Exactly one input: a local PDF, an S3 object, a URL or a directory of PDFs.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Local PDF file
    #[arg(long, value_name = "FILE")]
    pub pdf: Option<PathBuf>,

    /// S3 object (s3://bucket/key); credentials from AWS_* environment variables
    #[arg(long, value_name = "URI")]
    pub s3_uri: Option<String>,

    /// HTTP(S) URL of a PDF
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Directory; every *.pdf directly inside it is processed in name order
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Write all tables to this workbook (overwritten)
    #[arg(long, value_name = "FILE")]
    pub out_xlsx: Option<PathBuf>,

    /// Database connection string (postgres://... or sqlite:PATH)
    #[arg(long, env = "PG_URL", value_name = "URL", hide_env_values = true)]
    pub pg_url: Option<String>,

    /// Database schema for the tables (PostgreSQL only)
    #[arg(long, default_value = "public")]
    pub schema: String,

    /// Drop and recreate each table before the run's first write
    #[arg(long)]
    pub replace: bool,

    /// Custom JSON rule file instead of the built-in preset
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Output format: table (default) or json
    #[arg(short, long, default_value = "table", value_parser = ["table", "json"])]
    pub output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and load standard specification documents
    Spec(RunArgs),
    /// Extract and load invoice line items
    Invoice(RunArgs),
    /// Parse documents into candidate records without normalizing or loading them
    Parse {
        /// Document type
        #[arg(long, value_parser = ["spec", "invoice"])]
        doc_type: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table", value_parser = ["table", "json"])]
        output: String,

        /// Write parsed output to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// Custom JSON rule file
        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,
    },
    /// Manage and inspect rulesets
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List predefined rulesets
    List,
    /// Print the rules of a predefined ruleset in priority order
    Show {
        /// Preset name (e.g., "invoice")
        preset: String,
    },
    /// Validate a custom rule file
    Validate {
        /// Path to JSON rule file
        file: PathBuf,
    },
    /// Print the rule file format and the target table layouts
    Schema,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Ok(false) means the command ran but at least one document failed.
    let result = match cli.command {
        Commands::Spec(args) => commands::run::run(DocType::Spec, &args),
        Commands::Invoice(args) => commands::run::run(DocType::Invoice, &args),
        Commands::Parse {
            doc_type,
            source,
            output,
            out,
            rules,
        } => commands::parse::run(&doc_type, &source, &output, out, rules),
        Commands::Rules { action } => match action {
            RulesAction::List => commands::rules::list(),
            RulesAction::Show { preset } => commands::rules::show(&preset),
            RulesAction::Validate { file } => commands::rules::validate(&file),
            RulesAction::Schema => commands::rules::schema(),
        }
        .map(|()| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
