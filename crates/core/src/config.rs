//! Runtime configuration resolved once at process startup.
//!
//! This module defines configuration that should be resolved once in `main` and then
//! passed into the pipeline services. The intent is to avoid reading process-wide
//! environment variables during request handling, which can lead to inconsistent
//! behaviour in multi-threaded runtimes and test harnesses.
//!
//! Absent credentials are not an error: a missing model key or missing extraction
//! client credentials simply select the deterministic fallback path for that service.

/// Default chat-completions endpoint for SOAP note generation.
pub const DEFAULT_MODEL_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model identifier sent with generation requests.
pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";

/// Default OAuth token endpoint for the entity-extraction API.
pub const DEFAULT_NLP_AUTH_URL: &str = "https://auth.imohealth.com/oauth/token";

/// Default entity-extraction pipeline endpoint.
pub const DEFAULT_NLP_PIPELINE_URL: &str =
    "https://api.imohealth.com/entityextraction/pipelines/imo-clinical-comprehensive";

/// OAuth audience claim required by the extraction API's token endpoint.
pub const NLP_AUDIENCE: &str = "https://api.imohealth.com";

/// Credentials and endpoint for the hosted generative model.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl ModelConfig {
    /// Build a `ModelConfig` from optional raw values (typically environment variables).
    ///
    /// Returns `None` when no API key is present, which selects the rule-based
    /// fallback for SOAP generation. Endpoint and model name fall back to the
    /// defaults when absent.
    pub fn from_values(
        api_key: Option<String>,
        endpoint: Option<String>,
        model: Option<String>,
    ) -> Option<Self> {
        let api_key = non_empty(api_key)?;
        Some(Self {
            endpoint: non_empty(endpoint).unwrap_or_else(|| DEFAULT_MODEL_ENDPOINT.into()),
            api_key,
            model: non_empty(model).unwrap_or_else(|| DEFAULT_MODEL_NAME.into()),
        })
    }
}

/// Credentials and endpoints for the hosted entity-extraction API.
#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    pub auth_url: String,
    pub pipeline_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl ExtractionConfig {
    /// Build an `ExtractionConfig` from optional raw values.
    ///
    /// Returns `None` unless both the client id and client secret are present,
    /// which selects the keyword fallback for entity extraction. URLs fall back
    /// to the defaults when absent.
    pub fn from_values(
        client_id: Option<String>,
        client_secret: Option<String>,
        auth_url: Option<String>,
        pipeline_url: Option<String>,
    ) -> Option<Self> {
        let client_id = non_empty(client_id)?;
        let client_secret = non_empty(client_secret)?;
        Some(Self {
            auth_url: non_empty(auth_url).unwrap_or_else(|| DEFAULT_NLP_AUTH_URL.into()),
            pipeline_url: non_empty(pipeline_url)
                .unwrap_or_else(|| DEFAULT_NLP_PIPELINE_URL.into()),
            client_id,
            client_secret,
        })
    }
}

/// Scribe configuration resolved at startup.
#[derive(Clone, Debug, Default)]
pub struct ScribeConfig {
    model: Option<ModelConfig>,
    extraction: Option<ExtractionConfig>,
}

impl ScribeConfig {
    /// Create a new `ScribeConfig`.
    ///
    /// Either section may be `None`; the corresponding service then runs in demo
    /// mode with its deterministic local fallback.
    pub fn new(model: Option<ModelConfig>, extraction: Option<ExtractionConfig>) -> Self {
        Self { model, extraction }
    }

    pub fn model(&self) -> Option<&ModelConfig> {
        self.model.as_ref()
    }

    pub fn extraction(&self) -> Option<&ExtractionConfig> {
        self.extraction.as_ref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
