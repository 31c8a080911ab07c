use clap::Parser;
use log::error;
use procsol::server;
use procsol::util::config::AppConfig;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(author, version, about = "Consolidates per-process usage samples from uploaded SQLite databases", long_about = None)]
struct Cli {
    /// Address to listen on (overrides config)
    #[arg(long)]
    listen: Option<String>,

    /// Data directory holding the active database (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    if let Err(e) = server::serve(config) {
        error!("server exited with error: {:#}", e);
        process::exit(1);
    }
}
