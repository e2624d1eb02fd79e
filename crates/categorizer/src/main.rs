mod color;
mod config;
mod error;
mod model;
mod oracle;
mod rate_limit;
mod resolver;
mod server;
mod store;
mod verdict;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use journal_common::openai::OpenAiClientConfig;
use journal_common::redis::RedisStore;

use config::Config;
use oracle::{Classifier, OpenAiClassifier};
use rate_limit::RateLimiter;
use server::AppState;
use store::{CategoryStore, MemoryCategoryStore, RedisCategoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting categorizer");

    let config = Config::from_env()?;
    info!(
        listen_addr = %config.listen_addr,
        model = %config.model,
        redis = config.redis_url.is_some(),
        recovery_creation = config.recovery_creation,
        default_title = %config.default_title,
        rate_limit_rps = config.rate_limit_rps,
        "configuration loaded"
    );

    let openai_config = OpenAiClientConfig::from_env();
    info!(
        base_url = %openai_config.base_url,
        api_key = openai_config.api_key.is_some(),
        timeout_ms = openai_config.default_timeout.as_millis(),
        "classifier client configured"
    );
    let classifier: Arc<dyn Classifier> =
        Arc::new(OpenAiClassifier::new(openai_config, config.model.clone())?);

    let store: Arc<dyn CategoryStore> = match config.redis_url.as_deref() {
        Some(url) => {
            let redis = RedisStore::connect(url).await?;
            if !redis.is_available().await {
                anyhow::bail!("redis did not answer PING at startup");
            }
            info!("redis connected, categories are durable");
            Arc::new(RedisCategoryStore::new(redis))
        }
        None => {
            info!("REDIS_URL not set, keeping categories in memory");
            Arc::new(MemoryCategoryStore::new())
        }
    };

    let limiter = RateLimiter::new(config.rate_limit_rps);
    let state = AppState::new(store, classifier, config.resolver_policy(), limiter);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %config.listen_addr, "categorizer ready, serving HTTP");
    axum::serve(listener, server::router(state)).await?;
    info!("categorizer shut down");
    Ok(())
}
