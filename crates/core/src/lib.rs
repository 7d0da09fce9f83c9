//! # Scribe Core
//!
//! Core business logic for the clinical scribe pipeline.
//!
//! This crate contains the two pipeline services and their configuration:
//! - Transcript → SOAP note generation against a hosted model, with a deterministic
//!   rule-based fallback ([`soap`])
//! - SOAP note → clinical entity extraction against a hosted API, with a deterministic
//!   keyword fallback ([`extract`])
//! - Runtime configuration resolved once at startup ([`config`])
//!
//! **No API concerns**: HTTP routing, endpoint bodies, and OpenAPI documentation belong
//! in `api-rest`.

pub mod config;
pub mod error;
pub mod extract;
pub mod note;
pub mod sample;
pub mod soap;

pub use config::{ExtractionConfig, ModelConfig, ScribeConfig};
pub use error::{UpstreamError, UpstreamResult};
pub use extract::{EntityExtractor, ExtractionOutcome};
pub use note::{Entity, EntityCollection, EntityCounts, SoapNote};
pub use sample::SAMPLE_TRANSCRIPT;
pub use soap::{SoapGenerator, SoapOutcome};

/// Whether a pipeline step's output came from the hosted service or the local fallback.
///
/// The HTTP contract collapses both variants into `success: true`; provenance exists so
/// that callers and tests can distinguish the two paths, and so the choice can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Produced by the hosted external service.
    Live,
    /// Produced by the local deterministic fallback.
    Fallback,
}
