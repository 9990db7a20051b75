use clap::Parser;
use colored::Colorize;

mod cli;
mod command_handler;
mod commands;
mod connection;
mod errors;
mod storage;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = cli::Cli::parse();
    if let Err(e) = command_handler::handle_command(args.command).await {
        eprintln!("{} {:?}", "error:".red(), e);
        std::process::exit(1);
    }
}
