// src/main.rs
use clap::Parser;
use subsync_cli::cli::Cli;

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            std::process::exit(15);
        }
    };

    let config_service = match subsync_cli::config::ProductionConfigService::new() {
        Ok(service) => service,
        Err(e) => {
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    };

    match subsync_cli::cli::run(cli, &config_service) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    }
}
