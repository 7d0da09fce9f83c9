//! # API REST
//!
//! REST API implementation for the clinical scribe pipeline.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialisation, CORS, the demo frontend page)
//!
//! The pipeline itself lives in `scribe-core`; handlers here validate bodies,
//! dispatch to the core services, and serialise responses. Every endpoint is
//! stateless and independently invocable — the router does not enforce that
//! generation happens before extraction.

#![warn(rust_2018_idioms)]

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use axum::extract::State;
use scribe_core::{
    Entity, EntityCollection, EntityCounts, EntityExtractor, ScribeConfig, SoapGenerator,
    SoapNote, SAMPLE_TRANSCRIPT,
};
use scribe_types::Transcript;

/// Application state shared across REST API handlers.
///
/// Holds the two pipeline services, each constructed once from the startup
/// configuration. There is no other cross-request state.
#[derive(Clone)]
pub struct AppState {
    soap: Arc<SoapGenerator>,
    extractor: Arc<EntityExtractor>,
}

impl AppState {
    /// Builds the application state from the startup configuration.
    pub fn new(config: ScribeConfig) -> Self {
        Self {
            soap: Arc::new(SoapGenerator::new(&config)),
            extractor: Arc::new(EntityExtractor::new(&config)),
        }
    }
}

/// Health check response.
#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Request body for SOAP note generation.
#[derive(Deserialize, ToSchema)]
pub struct GenerateSoapReq {
    /// Encounter transcript; must contain at least one non-whitespace character.
    #[serde(default)]
    pub transcript: String,
}

/// Response body for SOAP note generation.
#[derive(Serialize, ToSchema)]
pub struct GenerateSoapRes {
    pub soap_note: SoapNote,
    pub success: bool,
}

/// Request body for entity extraction.
#[derive(Deserialize, ToSchema)]
pub struct ExtractEntitiesReq {
    pub soap_note: SoapNoteBody,
}

/// A SOAP note as submitted by clients for extraction.
///
/// All sections default to empty strings so a client can submit only the
/// assessment and plan fields — the only sections extraction reads.
#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct SoapNoteBody {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl From<SoapNoteBody> for SoapNote {
    fn from(body: SoapNoteBody) -> Self {
        SoapNote {
            subjective: body.subjective,
            objective: body.objective,
            assessment: body.assessment,
            plan: body.plan,
        }
    }
}

/// Response body for entity extraction.
#[derive(Serialize, ToSchema)]
pub struct ExtractEntitiesRes {
    pub entities: EntityCollection,
    pub entity_counts: EntityCounts,
    pub success: bool,
}

/// Response body for the sample transcript endpoint.
#[derive(Serialize, ToSchema)]
pub struct SampleTranscriptRes {
    pub transcript: String,
    pub success: bool,
}

/// Error body returned for client input errors and removed capabilities.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

fn client_error(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        generate_soap,
        extract_entities,
        load_sample_transcript,
        normalize_entities,
        refine_entities,
    ),
    components(schemas(
        HealthRes,
        GenerateSoapReq,
        GenerateSoapRes,
        SoapNote,
        ExtractEntitiesReq,
        SoapNoteBody,
        ExtractEntitiesRes,
        Entity,
        EntityCollection,
        EntityCounts,
        SampleTranscriptRes,
        ErrorBody,
    ))
)]
struct ApiDoc;

/// Builds the REST router over the given application state.
///
/// Used by the `scribe-run` binary and by the in-crate tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/generate_soap", post(generate_soap))
        .route("/extract_entities", post(extract_entities))
        .route("/load_sample_transcript", get(load_sample_transcript))
        .route("/normalize_entities", post(normalize_entities))
        .route("/refine_entities", post(refine_entities))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the single-page demo frontend.
///
/// The page drives the pipeline with sequential fetches against the JSON endpoints;
/// it carries no state of its own.
async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Scribe REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/generate_soap",
    request_body = GenerateSoapReq,
    responses(
        (status = 200, description = "SOAP note generated", body = GenerateSoapRes),
        (status = 400, description = "Empty or missing transcript", body = ErrorBody)
    )
)]
/// Generate a SOAP note from an encounter transcript
///
/// Delegates to the hosted model when configured; any model failure is absorbed by
/// the deterministic rule-based fallback, so a valid transcript always yields
/// `success: true`. An empty or missing transcript is the only client error.
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - the transcript is missing, empty, or whitespace-only.
#[axum::debug_handler]
async fn generate_soap(
    State(state): State<AppState>,
    Json(req): Json<GenerateSoapReq>,
) -> Result<Json<GenerateSoapRes>, (StatusCode, Json<ErrorBody>)> {
    let transcript = match Transcript::new(&req.transcript) {
        Ok(transcript) => transcript,
        Err(e) => {
            tracing::warn!("rejecting SOAP generation request: {e}");
            return Err(client_error("transcript is required and cannot be empty"));
        }
    };

    let outcome = state.soap.generate(&transcript).await;
    tracing::debug!(provenance = ?outcome.provenance, "SOAP note generated");

    Ok(Json(GenerateSoapRes {
        soap_note: outcome.note,
        success: true,
    }))
}

#[utoipa::path(
    post,
    path = "/extract_entities",
    request_body = ExtractEntitiesReq,
    responses(
        (status = 200, description = "Entities extracted", body = ExtractEntitiesRes),
        (status = 400, description = "Malformed request body"),
        (status = 422, description = "Request body does not match the schema")
    )
)]
/// Extract clinical entities from a SOAP note
///
/// Reads only the assessment and plan sections. Runs against the hosted extraction
/// API when credentials are configured, otherwise against the deterministic keyword
/// fallback; both paths report `success: true`. The returned counts are derived
/// from the returned collection on every call.
#[axum::debug_handler]
async fn extract_entities(
    State(state): State<AppState>,
    Json(req): Json<ExtractEntitiesReq>,
) -> Json<ExtractEntitiesRes> {
    let note = SoapNote::from(req.soap_note);
    let outcome = state.extractor.extract(&note).await;
    tracing::debug!(provenance = ?outcome.provenance, "entities extracted");

    let entity_counts = outcome.entities.counts();
    Json(ExtractEntitiesRes {
        entities: outcome.entities,
        entity_counts,
        success: true,
    })
}

#[utoipa::path(
    get,
    path = "/load_sample_transcript",
    responses(
        (status = 200, description = "Fixed sample transcript", body = SampleTranscriptRes)
    )
)]
/// Load the fixed sample transcript
///
/// Returns the same embedded text on every call.
#[axum::debug_handler]
async fn load_sample_transcript() -> Json<SampleTranscriptRes> {
    Json(SampleTranscriptRes {
        transcript: SAMPLE_TRANSCRIPT.to_string(),
        success: true,
    })
}

/// Fixed response for capabilities that have been permanently removed.
///
/// Terminology normalisation and clinician-driven refinement were removed from the
/// pipeline. 410 Gone — rather than 404 or a generic server error — lets client
/// integrations detect that the capability is intentionally gone, not transiently
/// failing.
fn capability_removed(name: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::GONE,
        Json(ErrorBody {
            success: false,
            error: format!("The {name} capability has been removed"),
        }),
    )
}

#[utoipa::path(
    post,
    path = "/normalize_entities",
    responses(
        (status = 410, description = "Capability permanently removed", body = ErrorBody)
    )
)]
/// Removed: terminology normalisation
///
/// Always returns 410 Gone, regardless of body content.
async fn normalize_entities() -> (StatusCode, Json<ErrorBody>) {
    capability_removed("entity normalisation")
}

#[utoipa::path(
    post,
    path = "/refine_entities",
    responses(
        (status = 410, description = "Capability permanently removed", body = ErrorBody)
    )
)]
/// Removed: clinician-driven entity refinement
///
/// Always returns 410 Gone, regardless of body content.
async fn refine_entities() -> (StatusCode, Json<ErrorBody>) {
    capability_removed("entity refinement")
}
