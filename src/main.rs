use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Instant;
use wakechirp::app::run_chirp_command;
use wakechirp::cli::{Cli, Commands, ConfigAction};
use wakechirp::config::Config;
use wakechirp::pipeline::progress::format_hms;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    log::debug!("wakechirp {}", wakechirp::version_string());

    match &cli.command {
        None => {
            let Some(input) = cli.audio_in.as_deref() else {
                anyhow::bail!("no input file given");
            };
            let config = cli.apply_overrides(load_config(cli.config.as_deref())?);

            let started = Instant::now();
            if !cli.quiet {
                eprintln!("{}\n", "Creating MP3 files with chirps...".bold());
            }
            let report = run_chirp_command(config, input, cli.quiet, cli.seed)
                .with_context(|| format!("Failed to process {}", input.display()))?;

            if !cli.quiet {
                for path in report.output_paths() {
                    eprintln!("  {} {}", "wrote".green(), path.display());
                }
                eprintln!(
                    "\nTotal processing time: {}",
                    format_hms(started.elapsed().as_secs_f64()).cyan()
                );
            }
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "wakechirp",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Log level follows `-v`; `RUST_LOG` still wins when set.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else if let Some(default_path) = Config::default_path() {
        Config::load_or_default(&default_path)?
    } else {
        Config::default()
    };
    Ok(config.with_env_overrides())
}

fn handle_config_command(action: &ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => match custom_path
            .map(Path::to_path_buf)
            .or_else(Config::default_path)
        {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("Could not determine the configuration directory"),
        },
    }
    Ok(())
}
