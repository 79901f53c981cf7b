mod assessment;
mod config;
mod db;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assessment::service::Evaluator;
use crate::config::{Config, PipelineConfig};
use crate::db::{create_pool, init_schema};
use crate::extraction::Extractor;
use crate::llm_client::LlmClient;
use crate::pipeline::executor::LlmRoleExecutor;
use crate::pipeline::orchestrator::Orchestrator;
use crate::pipeline::roles::RoleGraph;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting assessor v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    init_schema(&db).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client and the evaluator pipeline
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    let evaluator = build_evaluator(&config.pipeline, llm)?;

    let state = AppState {
        db,
        s3,
        config: config.clone(),
        evaluator: Arc::new(evaluator),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the role graph for the configured topology and wires it to the model.
fn build_evaluator(pipeline: &PipelineConfig, llm: LlmClient) -> Result<Evaluator> {
    let topology = pipeline.topology;
    let capabilities = pipeline.capabilities();
    let graph = RoleGraph::build(topology.graph_spec(), &capabilities)?;
    info!(
        "Pipeline: {topology} topology, {} roles, model {}, turn budget {}, {} capabilities",
        graph.len(),
        pipeline.model,
        pipeline.turn_budget,
        capabilities.len()
    );

    let extractor = Extractor::new(topology.extraction_profile())?;
    let executor = LlmRoleExecutor::new(llm, pipeline.model.clone());
    let orchestrator = Orchestrator::new(Arc::new(graph), Arc::new(executor));
    Ok(Evaluator::new(
        orchestrator,
        extractor,
        topology.entry_role(),
        pipeline.turn_budget,
    ))
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "assessor-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
