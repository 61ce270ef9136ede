use anyhow::{bail, Context, Result};
use circle_recommendation_service::{
    config::CacheBackend,
    models::{Algorithm, InterestNode, RecommendationContext, RecommendationRequest},
    services::{InMemorySimilarityCache, RedisSimilarityCache},
    Config, FusionOrchestrator, InterestHierarchyIndex, KeywordClusters, SimilarityCache,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Input file: the interest taxonomy plus one request context
#[derive(Deserialize)]
struct Snapshot {
    taxonomy: Vec<InterestNode>,
    context: RecommendationContext,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "circle_recommendation_service=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr; stdout carries the JSON result
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_snapshot(path: &str) -> Result<Snapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse snapshot {}", path))
}

fn similarity_cache(config: &Config) -> Result<Arc<dyn SimilarityCache>> {
    Ok(match config.cache.backend {
        CacheBackend::Memory => Arc::new(InMemorySimilarityCache::new()),
        CacheBackend::Redis => {
            let client = redis::Client::open(config.redis.url.clone())
                .context("Failed to create Redis client")?;
            Arc::new(RedisSimilarityCache::new(client, config.redis.key_prefix.clone()))
        }
    })
}

fn usage() -> &'static str {
    "usage: circle-recommendation-service <recommend|preferences> <snapshot.json> [algorithm] [limit]"
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load config")?;

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let Some(snapshot_path) = args.get(2) else {
        bail!(usage());
    };

    let snapshot = load_snapshot(snapshot_path)?;
    let taxonomy = InterestHierarchyIndex::from_nodes(snapshot.taxonomy)
        .context("Invalid interest taxonomy")?;

    info!(
        service = %config.service.service_name,
        cache_backend = ?config.cache.backend,
        taxonomy_nodes = taxonomy.len(),
        groups = snapshot.context.groups.len(),
        "Snapshot loaded"
    );

    let orchestrator = FusionOrchestrator::from_config(
        &config,
        Arc::new(taxonomy),
        Arc::new(KeywordClusters::default()),
        similarity_cache(&config)?,
    );
    let ctx = snapshot.context;

    let output = match command {
        "recommend" => {
            let algorithm: Algorithm = args
                .get(3)
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(Algorithm::Smart);
            let limit: usize = args
                .get(4)
                .map(|s| s.parse())
                .transpose()
                .context("limit must be a positive integer")?
                .unwrap_or(10);

            let request = RecommendationRequest::new(ctx.user.user_id.clone())
                .with_algorithm(algorithm)
                .with_limit(limit);
            let response = orchestrator.recommend(&ctx, &request).await?;
            serde_json::to_string_pretty(&response)?
        }
        "preferences" => serde_json::to_string_pretty(&orchestrator.user_preferences(&ctx))?,
        _ => bail!(usage()),
    };

    println!("{}", output);
    Ok(())
}
