pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use parcelwise_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "parcelwise",
    about = "Parcelwise delivery booking and pricing CLI",
    long_about = "Create sample estimates and orders, compare pricing models, and chat with the pricing advisor.",
    after_help = "Examples:\n  parcelwise estimate\n  parcelwise pricing\n  parcelwise --config parcelwise.toml chat"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Load configuration from this file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Request a sample San Francisco to Oakland cargo van estimate")]
    Estimate,
    #[command(about = "Place a sample delivery order")]
    Order,
    #[command(about = "Compare pricing models across four customer scenarios")]
    Pricing,
    #[command(about = "Chat with the conversational pricing advisor")]
    Chat,
    #[command(about = "Show booking mode and conversation engine capabilities")]
    Status,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            ..LoadOptions::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Estimate => commands::estimate::run(&options),
        Command::Order => commands::order::run(&options),
        Command::Pricing => commands::pricing::run(&options),
        Command::Chat => commands::chat::run(&options),
        Command::Status => commands::status::run(&options),
        Command::Config => commands::config::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
