mod api;
mod aws;
mod config;
mod error;
mod routes;
mod rule;

use anyhow::Context;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

use api::rest::AppState;
use aws::{AwsConfigService, StsCredentialProvider};
use config::{Config, Mode};
use rule::event::ConfigRuleEvent;
use rule::handler::RuleContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging before the config is read; the level is reloaded once known
    let (filter, log_level) = reload::Layer::new(log_filter(Level::INFO));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    log_level.reload(log_filter(config.log_level))?;
    tracing::info!("{} rule starting...", rule::RULE_NAME);

    let watched: Vec<String> = config
        .rule
        .default_watched
        .blocks()
        .iter()
        .map(|b| b.to_string())
        .collect();
    tracing::info!(
        "Watched CIDR blocks: {} (assume role: {}, submit: {})",
        watched.join(", "),
        config.rule.assume_role_mode,
        config.rule.submit_evaluations
    );

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let rule = RuleContext::new(
        config.rule.clone(),
        Arc::new(StsCredentialProvider::new(&sdk_config)),
        Arc::new(AwsConfigService::new(sdk_config)),
    );

    match &config.mode {
        Mode::Serve => serve(&config, rule).await,
        Mode::Evaluate { event } => evaluate_once(&rule, event).await,
    }
}

/// RUST_LOG directives refine the configured level
fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

async fn serve(config: &Config, rule: RuleContext) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;

    let state = Arc::new(AppState::new(rule));
    let app = api::rest::create_api_router(state);

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST http://{}/evaluate", addr);
    tracing::info!("  GET  http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn evaluate_once(rule: &RuleContext, path: &Path) -> anyhow::Result<()> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event from {}", path.display()))?
    };

    let event: ConfigRuleEvent = serde_json::from_str(&raw).context("Event is not a valid rule event")?;

    match rule.handle(&event).await {
        Ok(verdicts) => {
            println!("{}", serde_json::to_string_pretty(&verdicts)?);
            Ok(())
        }
        Err(error) => {
            println!("{}", serde_json::to_string_pretty(&error)?);
            Err(anyhow::anyhow!(
                "{}: {}",
                error.customer_error_code,
                error.customer_error_message
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn test_configured_level_replaces_startup_filter() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let (_layer, handle) = reload::Layer::<_, Registry>::new(log_filter(Level::INFO));
        assert!(handle.with_current(|f| f.to_string()).unwrap().contains("info"));

        handle.reload(log_filter(Level::DEBUG)).unwrap();
        assert!(handle.with_current(|f| f.to_string()).unwrap().contains("debug"));
    }
}
