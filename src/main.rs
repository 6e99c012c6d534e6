mod assembler;
mod collectors;
mod command;
mod config;
mod report;
mod rules;
#[cfg(test)]
mod testutil;

use clap::Parser;
use collectors::Host;
use config::Config;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "./sysreport.yaml";

const BANNER: &str = r"                                             __
   _______  ___________ ___  ____  ____  _____/ /_
  / ___/ / / / ___/ __ `/ _ \/ __ \/ __ \/ ___/ __/
 (__  ) /_/ (__  ) /  /  __/ /_/ / /_/ / /  / /_
/____/\__, /____/_/   \___/ .___/\____/_/   \__/
     /____/              /_/
";

#[derive(Parser, Debug)]
#[command(name = "sysreport")]
#[command(version)]
struct Cli {
    /// YAML config; defaults to ./sysreport.yaml when that file exists.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    /// Print the JSON report to stdout instead of writing a file.
    #[arg(long)]
    stdout: bool,
    #[arg(long, conflicts_with = "stdout")]
    output: Option<PathBuf>,
}

/// Human progress lines. They move to stderr when stdout carries the report.
struct Progress {
    to_stderr: bool,
}

impl Progress {
    fn line(&self, text: &str) {
        if self.to_stderr {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let loaded = match &cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::load_or_default(DEFAULT_CONFIG_PATH),
    };
    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            eprintln!("sysreport: {err}");
            std::process::exit(1);
        }
    };

    let progress = Progress {
        to_stderr: cli.stdout,
    };
    progress.line(BANNER);
    progress.line(&format!("sysreport {}", env!("CARGO_PKG_VERSION")));
    progress.line("Running report now...");

    info!(
        cpu_sample_interval = ?cfg.cpu_sample_interval,
        command_timeout = ?cfg.command_timeout,
        "запуск сбора отчёта"
    );

    let host = Host::current(cfg.command_timeout);
    let report = assembler::collect_report(&host, &cfg, |line| progress.line(line)).await;

    if cli.stdout {
        match report.to_pretty_json() {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!(error = %err, "не удалось сериализовать отчёт");
                eprintln!("sysreport: {err}");
                std::process::exit(1);
            }
        }
        return;
    }

    let path = cli.output.unwrap_or_else(|| PathBuf::from(&cfg.output));
    if let Err(err) = report.write_to(&path) {
        error!(error = %err, "не удалось записать отчёт");
        eprintln!("sysreport: {err}");
        std::process::exit(1);
    }

    progress.line("");
    progress.line(&format!("Report written to {}", path.display()));
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
