//! simpfw - firewalld rule compiler
//!
//! Reads a JSON rules document and emits the firewalld resources that enforce it.
//!
//! # Usage
//!
//! ```bash
//! simpfw compile rules.json                     # Catalog as JSON
//! simpfw compile rules.json --format cmd -o apply.sh  # firewall-cmd script
//! simpfw compile rules.json --format rich       # Rich rules per zone
//! simpfw checksum rules.json                    # SHA-256 of the compiled catalog
//! simpfw diff old.json new.json                 # What would change
//! simpfw ipset-name 10.0.0.0/8 192.168.1.0/24   # Identifier of a network set
//! simpfw policy --write                         # Save effective policy config
//! ```
//!
//! Logs go to stderr; `-v` raises the level to debug.

use clap::{Parser, Subcommand, ValueEnum};
use simpfw::config::{self, PolicyConfig};
use simpfw::core::address::classify;
use simpfw::core::identifier::derive;
use simpfw::core::partition::partition;
use simpfw::core::render;
use simpfw::core::rule::ApplyTo;
use simpfw::{Catalog, Error, Result, parse_rules, utils};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "simpfw", version)]
#[command(about = "Compile declarative firewall rules into firewalld resources", long_about = None)]
struct Cli {
    /// Policy configuration file (default: per-user config.json, then built-ins)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a rules document
    Compile {
        /// Rules document (`{"rules": [...]}` or a bare array)
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Write to this file instead of stdout (atomic replace)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print the checksum of a compiled rules document
    Checksum { file: PathBuf },
    /// Show how the compiled catalog changes between two rules documents
    Diff { old: PathBuf, new: PathBuf },
    /// Derive ipset identifiers for a list of networks
    IpsetName {
        #[arg(required = true)]
        networks: Vec<String>,
    },
    /// Print the effective policy configuration
    Policy {
        /// Save it as the per-user config file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Full catalog as JSON
    Json,
    /// Rich rules grouped by zone
    Rich,
    /// Shell script of firewall-cmd calls
    Cmd,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match handle_cli(cli.command, cli.config.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(e: &Error) {
    let translation = e.translate();
    eprintln!("Error: {e}");
    for suggestion in &translation.suggestions {
        eprintln!("  • {suggestion}");
    }
    if let Some(url) = &translation.help_url {
        eprintln!("  See: {url}");
    }
}

async fn handle_cli(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config(config_path).await?;

    match command {
        Commands::Compile {
            file,
            format,
            output,
        } => {
            let catalog = compile_file(&file, &config).await?;
            for notification in &catalog.notifications {
                eprintln!("Warning: {}", notification.message);
            }

            let text = match format {
                OutputFormat::Json => {
                    let mut json = catalog.to_json()?;
                    json.push('\n');
                    json
                }
                OutputFormat::Rich => render::rich_rules_text(&catalog),
                OutputFormat::Cmd => render::firewall_cmd_script(&catalog),
            };

            match output {
                Some(path) => {
                    utils::write_output(&path, &text)?;
                    eprintln!("✓ Wrote {}", path.display());
                }
                None => print!("{text}"),
            }
        }
        Commands::Checksum { file } => {
            let catalog = compile_file(&file, &config).await?;
            println!("{}  {}", catalog.checksum()?, file.display());
        }
        Commands::Diff { old, new } => {
            let old_catalog = compile_file(&old, &config).await?;
            let new_catalog = compile_file(&new, &config).await?;
            match old_catalog.diff(&new_catalog)? {
                Some(diff) => print!("{diff}"),
                None => eprintln!("No changes"),
            }
        }
        Commands::IpsetName { networks } => {
            let tokens = networks
                .iter()
                .map(|net| classify(net).map_err(|e| e.in_rule("command line")))
                .collect::<Result<Vec<_>>>()?;
            let parts = partition(&tokens, ApplyTo::Any);
            for host in &parts.hostnames {
                eprintln!("Warning: ignoring hostname '{host}'");
            }
            for set in parts.sets() {
                println!(
                    "{}  {}  {}",
                    set.family(),
                    derive(set, &config.ipset_prefix),
                    set.canonical_members().join(",")
                );
            }
        }
        Commands::Policy { write } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if write {
                let path = config::save_config(&config).await?;
                eprintln!("✓ Saved {}", path.display());
            }
        }
    }

    Ok(())
}

async fn compile_file(path: &Path, config: &PolicyConfig) -> Result<Catalog> {
    tracing::debug!("Reading rules from {}", path.display());
    let json = tokio::fs::read_to_string(path).await?;
    let decls = parse_rules(&json)?;
    Catalog::compile(&decls, config)
}
