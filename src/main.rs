use anyhow::Result;
use azcostctl::config::{self, Config};
use azcostctl::exit_codes::exit_code_for_anyhow;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use crate::commands::{groups, sizing, vm, AzureArgs, LogFormat, OutputFormat};

#[derive(Parser)]
#[command(name = "azcostctl")]
#[command(
    about = "Cost governance for Azure subscriptions",
    long_about = "azcostctl keeps an Azure subscription tidy and right-sized.\n\nFeatures:\n  - Owner discovery from the activity log\n  - OwnerEmail / TTL tagging of resource groups\n  - TTL-based cleanup with owner notification\n  - VM deletion with NIC, OS disk and public IP\n  - VM utilization metrics and right-sizing recommendations\n\nCredentials are read from TENANT_ID, CLIENT_ID, CLIENT_SECRET and\nSUBSCRIPTION_ID (a .env file in the working directory is loaded first)."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    azure: AzureArgs,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Log format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag every resource group with its creator (OwnerEmail) and a TTL
    Tag {
        /// Show what would be tagged without writing
        #[arg(long)]
        dry_run: bool,
        /// TTL in days for groups without one (default from config)
        #[arg(long)]
        ttl: Option<u32>,
    },
    /// Inspect and manage resource groups
    Groups {
        #[command(subcommand)]
        subcommand: groups::GroupCommands,
    },
    /// Find who created a resource group
    Owner {
        name: String,
        /// Activity log lookback in days (max 90)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Delete resource groups whose TTL has expired
    Cleanup {
        /// Dry run (don't actually delete)
        #[arg(long)]
        dry_run: bool,
        /// Delete without further confirmation
        #[arg(short, long)]
        force: bool,
        /// Email each owner the list of their expired groups
        #[arg(long)]
        notify: bool,
        /// Sender address for notices
        #[arg(long, env = "MAIL_FROM")]
        from: Option<String>,
    },
    /// Inspect and delete virtual machines
    Vm {
        #[command(subcommand)]
        subcommand: vm::VmCommands,
    },
    /// List the VM sizes offered in a region
    Skus {
        location: String,
        /// Store the catalogue in the metrics database
        #[arg(long)]
        save: bool,
    },
    /// Show utilization metrics of a VM
    Metrics {
        resource_group: String,
        vm: String,
        /// Window in days (default from config)
        #[arg(long)]
        days: Option<i64>,
        /// Store the snapshot in the metrics database
        #[arg(long)]
        save: bool,
    },
    /// Suggest a smaller size for an under-used VM and email it
    Recommend {
        resource_group: String,
        vm: String,
        /// Recipients of the recommendation
        #[arg(long, num_args = 1..)]
        to: Vec<String>,
        /// Sender address
        #[arg(long, env = "MAIL_FROM")]
        from: Option<String>,
        #[arg(long)]
        days: Option<i64>,
    },
    /// Write a default configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = ".azcostctl.toml")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool, format: LogFormat) {
    // Suppress INFO by default; RUST_LOG wins over both
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = cli.output;

    if let Commands::Init { output } = &cli.command {
        return config::init_config(output);
    }

    let config = Config::load(cli.config.as_deref())?;
    let client = commands::connect(&cli.azure, &config).await?;

    match cli.command {
        Commands::Tag { dry_run, ttl } => {
            commands::governance::run_tag(&client, &config, dry_run, ttl, output).await?;
        }
        Commands::Groups { subcommand } => {
            groups::handle_command(subcommand, &client, &config, output).await?;
        }
        Commands::Owner { name, days } => {
            commands::governance::run_owner(&client, &config, &name, days, output).await?;
        }
        Commands::Cleanup {
            dry_run,
            force,
            notify,
            from,
        } => {
            commands::governance::run_cleanup(&client, &config, dry_run, force, notify, from, output)
                .await?;
        }
        Commands::Vm { subcommand } => {
            vm::handle_command(subcommand, &client, output).await?;
        }
        Commands::Skus { location, save } => {
            sizing::run_skus(&client, &config, &location, save, output).await?;
        }
        Commands::Metrics {
            resource_group,
            vm,
            days,
            save,
        } => {
            sizing::run_metrics(&client, &config, &resource_group, &vm, days, save, output).await?;
        }
        Commands::Recommend {
            resource_group,
            vm,
            to,
            from,
            days,
        } => {
            let args = sizing::RecommendArgs {
                resource_group,
                vm_name: vm,
                to,
                from,
                days,
            };
            sizing::run_recommend(&client, &config, args, output).await?;
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("error:").red().bold(), e);
        std::process::exit(exit_code_for_anyhow(&e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cleanup_flags() {
        let cli = Cli::try_parse_from(["azcostctl", "cleanup", "--dry-run", "--notify", "--output", "json"])
            .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Cleanup {
                dry_run,
                force,
                notify,
                ..
            } => {
                assert!(dry_run);
                assert!(!force);
                assert!(notify);
            }
            _ => panic!("expected cleanup"),
        }
    }

    #[test]
    fn test_parse_recommend_recipients() {
        let cli = Cli::try_parse_from([
            "azcostctl",
            "recommend",
            "rg-app",
            "vm-web-01",
            "--to",
            "a@contoso.com",
            "b@contoso.com",
        ])
        .unwrap();
        match cli.command {
            Commands::Recommend { to, vm, .. } => {
                assert_eq!(vm, "vm-web-01");
                assert_eq!(to, vec!["a@contoso.com", "b@contoso.com"]);
            }
            _ => panic!("expected recommend"),
        }
    }
}
