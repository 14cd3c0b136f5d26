//! CLI tool for checking a domain from the terminal
//!
//! Runs the analyzers directly (no HTTP server) and prints the JSON result.
//!
//! # Usage
//!
//! ```bash
//! # Full report
//! mailsec-check example.com --pretty
//!
//! # DKIM only, with a specific selector
//! mailsec-check example.com --protocol dkim --selector google
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mailsec_rs::analysis::CompositeAnalyzer;
use mailsec_rs::authentication::MailAuthVerifier;
use mailsec_rs::config::Config;
use mailsec_rs::logging::init_tracing;
use mailsec_rs::utils::{normalize_domain, DnsResolver};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mailsec-check")]
#[command(about = "Check the email authentication records of a domain", long_about = None)]
struct Cli {
    /// Domain to check (URLs and www. prefixes are accepted)
    domain: String,

    /// DKIM selector
    #[arg(short, long)]
    selector: Option<String>,

    /// Which check to run
    #[arg(short, long, value_enum, default_value_t = Protocol::All)]
    protocol: Protocol,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Protocol {
    Dmarc,
    Spf,
    Dkim,
    Mx,
    All,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    init_tracing(&config.logging)?;

    let domain = normalize_domain(&cli.domain)?;
    let resolver = Arc::new(DnsResolver::new(&config.dns));
    let verifier = MailAuthVerifier::from_config(&config).context("creating verifier")?;
    let analyzer =
        CompositeAnalyzer::from_config(&config.analysis, resolver.clone(), resolver, verifier);

    let selector = cli.selector.as_deref();
    match cli.protocol {
        Protocol::Dmarc => print_json(&analyzer.dmarc().analyze(&domain).await, cli.pretty),
        Protocol::Spf => print_json(&analyzer.spf().analyze(&domain).await, cli.pretty),
        Protocol::Dkim => print_json(
            &analyzer.dkim().analyze(&domain, selector).await,
            cli.pretty,
        ),
        Protocol::Mx => print_json(&analyzer.mx().analyze(&domain).await, cli.pretty),
        Protocol::All => print_json(&analyzer.analyze(&domain, selector).await, cli.pretty),
    }
}
