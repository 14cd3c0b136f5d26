use anyhow::Context;
use mailsec_rs::analysis::CompositeAnalyzer;
use mailsec_rs::api::ApiServer;
use mailsec_rs::authentication::MailAuthVerifier;
use mailsec_rs::config::Config;
use mailsec_rs::logging::init_tracing;
use mailsec_rs::utils::DnsResolver;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::var("MAILSEC_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::from_file(&config_path).with_context(|| format!("loading {}", config_path))?
    } else {
        Config::default()
    };

    init_tracing(&config.logging)?;

    info!("Starting mailsec-rs server");
    info!("  API listening on: {}", config.server.listen_addr);
    info!("  DNS timeout: {}s", config.dns.timeout_secs);
    info!("  Verifier enabled: {}", config.analysis.enable_verifier);
    info!(
        "  Rate limit: {} requests / {}s",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );

    let resolver = Arc::new(DnsResolver::new(&config.dns));
    let verifier = MailAuthVerifier::from_config(&config).context("creating verifier")?;

    let analyzer =
        CompositeAnalyzer::from_config(&config.analysis, resolver.clone(), resolver, verifier);

    let server = ApiServer::new(
        analyzer,
        &config.rate_limit,
        config.server.listen_addr.clone(),
    );
    server.run().await.context("API server failed")?;

    Ok(())
}
