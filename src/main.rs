use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use scribe_core::{ExtractionConfig, ModelConfig, ScribeConfig};

/// Main entry point for the Scribe application
///
/// Starts the REST server (default port 3000, configurable via SCRIBE_ADDR) that
/// exposes the transcript → SOAP note → entity extraction pipeline and serves the
/// demo frontend page.
///
/// Missing credentials are not an error: without a model API key the SOAP generator
/// runs its rule-based fallback, and without extraction client credentials the
/// entity extractor runs its keyword fallback.
///
/// # Environment Variables
/// - `SCRIBE_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `SCRIBE_MODEL_API_KEY`: API key for the hosted generative model
/// - `SCRIBE_MODEL_URL`: chat-completions endpoint override
/// - `SCRIBE_MODEL_NAME`: model identifier override
/// - `SCRIBE_NLP_CLIENT_ID` / `SCRIBE_NLP_CLIENT_SECRET`: extraction API credentials
/// - `SCRIBE_NLP_AUTH_URL`: extraction OAuth token endpoint override
/// - `SCRIBE_NLP_URL`: extraction pipeline endpoint override
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If server startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scribe_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("SCRIBE_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let model = ModelConfig::from_values(
        std::env::var("SCRIBE_MODEL_API_KEY").ok(),
        std::env::var("SCRIBE_MODEL_URL").ok(),
        std::env::var("SCRIBE_MODEL_NAME").ok(),
    );
    let extraction = ExtractionConfig::from_values(
        std::env::var("SCRIBE_NLP_CLIENT_ID").ok(),
        std::env::var("SCRIBE_NLP_CLIENT_SECRET").ok(),
        std::env::var("SCRIBE_NLP_AUTH_URL").ok(),
        std::env::var("SCRIBE_NLP_URL").ok(),
    );

    if model.is_none() {
        tracing::info!("no model API key set; SOAP generation will use the rule-based fallback");
    }
    if extraction.is_none() {
        tracing::info!(
            "no extraction credentials set; entity extraction will use the keyword fallback"
        );
    }

    let state = AppState::new(ScribeConfig::new(model, extraction));
    let app = api_rest::router(state);

    tracing::info!("++ Starting Scribe REST on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
