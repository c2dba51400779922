mod config;
mod error;
mod extract;
mod headers;
mod links;
mod pipeline;
mod report;
mod whois;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use config::{AnalysisOptions, Mode, Settings};
use links::resolve::HttpResolver;
use pipeline::Analyzer;
use report::{ConsoleReporter, JsonReporter, Reporter};
use whois::TcpWhois;

#[derive(Parser)]
#[command(name = "phishlens", version, about = "Inspect suspicious files and messages for phishing indicators")]
struct Cli {
    /// Settings file (TOML), merged under PHISHLENS_* environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, unwrap and resolve links; read authentication headers
    Analyze {
        /// Image, PDF, .msg or .eml file
        path: PathBuf,
        /// Links, headers and WHOIS
        #[arg(short, long)]
        all: bool,
        /// Link analysis
        #[arg(short, long)]
        links: bool,
        /// SPF/DKIM/DMARC/ARC verdicts
        #[arg(short = 'H', long)]
        headers: bool,
        /// WHOIS on the sender IP
        #[arg(short, long)]
        whois: bool,
        /// Explicit WHOIS target (implies --whois)
        #[arg(long, value_name = "IP")]
        whois_ip: Option<String>,
        /// Cap extracted text to the configured number of lines
        #[arg(short, long)]
        summary: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// No progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the unwrapped form of a wrapped URL
    Decode { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let code = match cli.command {
        Commands::Decode { url } => {
            println!("{}", links::decode::decode(&url, settings.max_unwrap_depth));
            ExitCode::SUCCESS
        }
        Commands::Analyze {
            path,
            all,
            links,
            headers,
            whois,
            whois_ip,
            summary,
            json,
            quiet,
        } => {
            let do_whois = all || whois || whois_ip.is_some();
            let none_picked = !(all || links || headers || do_whois);
            let opts = AnalysisOptions {
                mode: if summary { Mode::Summary } else { Mode::Full },
                emit_links: all || links || none_picked,
                emit_headers: all || headers || none_picked,
                do_whois,
                whois_target: whois_ip,
            };

            let resolver = HttpResolver::new(&settings).context("building HTTP client")?;
            let whois = TcpWhois::new(&settings);
            let analyzer = Analyzer::new(settings, Arc::new(resolver), Arc::new(whois))
                .with_progress(!quiet);

            match analyzer.analyze(&path, &opts).await {
                Ok(report) => {
                    let stdout = io::stdout().lock();
                    if json {
                        JsonReporter::new(stdout).report(&report)?;
                    } else {
                        ConsoleReporter::new(stdout).report(&report)?;
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    Ok(code)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from(["phishlens", "analyze", "-H", "--whois-ip", "8.8.8.8", "-s", "mail.eml"]).unwrap();
        match cli.command {
            Commands::Analyze { path, headers, whois_ip, summary, links, .. } => {
                assert_eq!(path, PathBuf::from("mail.eml"));
                assert!(headers && summary && !links);
                assert_eq!(whois_ip.as_deref(), Some("8.8.8.8"));
            }
            Commands::Decode { .. } => panic!("expected analyze"),
        }
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
