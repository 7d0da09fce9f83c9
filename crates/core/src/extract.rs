//! Clinical entity extraction: hosted API with a deterministic keyword fallback.
//!
//! The live path obtains an OAuth client-credentials token and submits the note's
//! assessment and plan text to the extraction pipeline. Live mode is selected only
//! when credentials are configured; their absence is a configuration switch, not an
//! error. Any live-path failure is absorbed by [`keyword_extract`].

use std::time::Duration;

use serde::Deserialize;

use crate::config::{ExtractionConfig, ScribeConfig, NLP_AUDIENCE};
use crate::error::{UpstreamError, UpstreamResult};
use crate::note::{Entity, EntityCollection, SoapNote};
use crate::Provenance;

/// Single-attempt timeout for the token and pipeline calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Context window (characters either side of the mention) for live entities.
const LIVE_CONTEXT_WINDOW: usize = 200;

/// Context window for fallback entities.
const DEMO_CONTEXT_WINDOW: usize = 50;

/// Generic or administrative mentions that the extraction API reports but which
/// carry no clinical value in this pipeline.
const IGNORED_PHRASES: &[&str] = &[
    "review test results",
    "patient education",
    "lifestyle",
    "education",
    "review",
    "follow-up",
    "follow up",
    "appointment",
    "monitoring",
    "discussion",
    "counseling",
    "instructions",
    "recommendations",
    "assessment",
    "plan",
];

/// Fallback vocabulary for the problems category.
const PROBLEM_KEYWORDS: &[&str] = &[
    "hypertension",
    "diabetes",
    "stemi",
    "myocardial infarction",
    "chest pain",
    "hyperlipidemia",
    "infection",
    "fever",
    "pneumonia",
    "copd",
    "heart failure",
    "arrhythmia",
    "stroke",
    "asthma",
    "angina",
    "headache",
    "migraine",
    "nausea",
];

/// Fallback vocabulary for the procedures category.
const PROCEDURE_KEYWORDS: &[&str] = &[
    "catheterization",
    "surgery",
    "biopsy",
    "intubation",
    "endoscopy",
    "colonoscopy",
    "angiography",
    "stent",
];

/// Fallback vocabulary for the medications category.
const MEDICATION_KEYWORDS: &[&str] = &[
    "aspirin",
    "metformin",
    "lisinopril",
    "atorvastatin",
    "clopidogrel",
    "heparin",
    "insulin",
    "warfarin",
    "levothyroxine",
    "amlodipine",
    "omeprazole",
    "prednisone",
    "albuterol",
    "ibuprofen",
    "acetaminophen",
];

/// Fallback vocabulary for the labs category.
const LAB_KEYWORDS: &[&str] = &[
    "troponin",
    "ekg",
    "blood pressure",
    "heart rate",
    "glucose",
    "hemoglobin",
    "creatinine",
    "bun",
    "wbc",
    "platelets",
    "inr",
    "cholesterol",
    "ldl",
    "hdl",
    "triglycerides",
];

/// Result of one extraction: the entities plus which path produced them.
#[derive(Clone, Debug)]
pub struct ExtractionOutcome {
    pub entities: EntityCollection,
    pub provenance: Provenance,
}

/// Service that extracts clinical entities from a [`SoapNote`].
///
/// Stateless across requests: the OAuth token is fetched per request rather than
/// cached, so the service holds no shared mutable state.
#[derive(Clone, Debug)]
pub struct EntityExtractor {
    client: reqwest::Client,
    extraction: Option<ExtractionConfig>,
}

impl EntityExtractor {
    /// Creates an extractor from the startup configuration.
    pub fn new(config: &ScribeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            extraction: config.extraction().cloned(),
        }
    }

    /// Extracts entities from the note's assessment and plan sections.
    ///
    /// This operation is infallible by design: missing credentials select the
    /// keyword fallback, and a failing live call falls back the same way with the
    /// failure logged. A note with empty assessment and plan yields an empty
    /// collection without calling out.
    pub async fn extract(&self, note: &SoapNote) -> ExtractionOutcome {
        let text = note.assessment_and_plan();
        if text.trim().is_empty() {
            return ExtractionOutcome {
                entities: EntityCollection::default(),
                provenance: Provenance::Fallback,
            };
        }

        if let Some(config) = &self.extraction {
            match self.extract_live(config, &text).await {
                Ok(entities) => {
                    tracing::info!("entities produced by hosted extraction API");
                    return ExtractionOutcome {
                        entities,
                        provenance: Provenance::Live,
                    };
                }
                Err(e) => {
                    tracing::warn!("extraction API call failed, using keyword fallback: {e}");
                }
            }
        } else {
            tracing::info!("no extraction credentials configured, using keyword fallback");
        }

        ExtractionOutcome {
            entities: keyword_extract(&text),
            provenance: Provenance::Fallback,
        }
    }

    /// Fetches a client-credentials access token from the auth endpoint.
    ///
    /// Tokens are not cached; each extraction request authenticates on its own.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if the request fails, the endpoint returns a
    /// non-2xx status, or the response carries no access token.
    async fn fetch_token(&self, config: &ExtractionConfig) -> UpstreamResult<String> {
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": config.client_id,
            "client_secret": config.client_secret,
            "audience": NLP_AUDIENCE,
        });

        let response = self
            .client
            .post(&config.auth_url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: TokenRes = response.json().await?;
        if payload.access_token.is_empty() {
            return Err(UpstreamError::Auth(
                "token response did not include an access token".into(),
            ));
        }
        Ok(payload.access_token)
    }

    /// Submits the text to the extraction pipeline and routes the reported entities.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if the token fetch or the pipeline call fails.
    async fn extract_live(
        &self,
        config: &ExtractionConfig,
        text: &str,
    ) -> UpstreamResult<EntityCollection> {
        let token = self.fetch_token(config).await?;

        let response = self
            .client
            .post(&config.pipeline_url)
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?;

        let payload: ExtractionRes = response.json().await?;
        Ok(route_entities(payload, text))
    }
}

#[derive(Deserialize)]
struct TokenRes {
    #[serde(default)]
    access_token: String,
}

#[derive(Deserialize)]
struct ExtractionRes {
    #[serde(default)]
    entities: Vec<RawEntity>,
}

/// One entity record as reported by the extraction pipeline.
#[derive(Deserialize)]
struct RawEntity {
    #[serde(default)]
    text: String,
    #[serde(default)]
    semantic: String,
    #[serde(default)]
    assertion: String,
    #[serde(default)]
    begin: usize,
    #[serde(default)]
    end: usize,
    #[serde(default)]
    codemaps: Codemaps,
}

#[derive(Deserialize, Default)]
struct Codemaps {
    imo: Option<ImoCodemap>,
}

#[derive(Deserialize)]
struct ImoCodemap {
    #[serde(default)]
    lexical_code: String,
    #[serde(default)]
    lexical_title: String,
    #[serde(default)]
    confidence: f64,
}

/// Routes the pipeline's entity records into the four fixed categories.
///
/// Records are kept only when asserted as present, and generic administrative
/// mentions are dropped. Category routing matches on the record's semantic type.
fn route_entities(response: ExtractionRes, source_text: &str) -> EntityCollection {
    let mut collection = EntityCollection::default();

    for raw in response.entities {
        if !raw.assertion.eq_ignore_ascii_case("present") {
            tracing::debug!(text = %raw.text, assertion = %raw.assertion, "skipping absent entity");
            continue;
        }

        let mention = raw.text.to_lowercase();
        if IGNORED_PHRASES.iter().any(|p| mention.contains(p)) {
            tracing::debug!(text = %raw.text, "ignoring generic entity");
            continue;
        }

        let (code, description, confidence) = match raw.codemaps.imo {
            Some(imo) => (imo.lexical_code, imo.lexical_title, imo.confidence),
            None => (String::new(), String::new(), 0.0),
        };

        let length = raw.end.saturating_sub(raw.begin);
        let entity = Entity {
            text: raw.text,
            code,
            code_system: "IMO".into(),
            description,
            confidence,
            context: context_window(source_text, raw.begin, length, LIVE_CONTEXT_WINDOW),
        };

        let semantic = raw.semantic.to_lowercase();
        if ["problem", "condition", "diagnosis"].iter().any(|k| semantic.contains(k)) {
            collection.problems.push(entity);
        } else if semantic.contains("procedure") {
            collection.procedures.push(entity);
        } else if semantic.contains("medication") || semantic.contains("drug") {
            collection.medications.push(entity);
        } else if ["lab", "observation", "test"].iter().any(|k| semantic.contains(k)) {
            collection.labs.push(entity);
        }
    }

    collection
}

/// Deterministic keyword extraction over the fixed per-category vocabularies.
///
/// Produces at most one entity per matched keyword (first occurrence wins), with
/// title-cased display text, a `DEMO-` code, and the category's fixed code system
/// and confidence. Identical input always yields identical output.
pub fn keyword_extract(text: &str) -> EntityCollection {
    EntityCollection {
        problems: keyword_entities(text, PROBLEM_KEYWORDS, "ICD-10-CM", 0.85),
        procedures: keyword_entities(text, PROCEDURE_KEYWORDS, "CPT", 0.80),
        medications: keyword_entities(text, MEDICATION_KEYWORDS, "RxNorm", 0.90),
        labs: keyword_entities(text, LAB_KEYWORDS, "LOINC", 0.75),
    }
}

fn keyword_entities(
    text: &str,
    keywords: &[&str],
    code_system: &str,
    confidence: f64,
) -> Vec<Entity> {
    let lower = text.to_lowercase();
    let mut entities = Vec::new();

    for keyword in keywords {
        if let Some(offset) = lower.find(keyword) {
            entities.push(Entity {
                text: title_case(keyword),
                code: format!("DEMO-{}", keyword.replace(' ', "-").to_uppercase()),
                code_system: code_system.into(),
                description: title_case(keyword),
                confidence,
                context: context_window(text, offset, keyword.len(), DEMO_CONTEXT_WINDOW),
            });
        }
    }

    entities
}

/// Extracts surrounding text for a mention, with ellipses where truncated.
///
/// Window boundaries are clamped to character boundaries so multi-byte input
/// cannot split a code point.
fn context_window(text: &str, offset: usize, length: usize, window: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let start = clamp_to_char_boundary(text, offset.saturating_sub(window));
    let end = clamp_to_char_boundary(text, offset.saturating_add(length).saturating_add(window));

    let mut context = text[start..end].trim().to_string();
    if start > 0 {
        context = format!("...{context}");
    }
    if end < text.len() {
        context.push_str("...");
    }
    context
}

fn clamp_to_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Capitalises the first letter of each whitespace-separated word.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headache_note() -> SoapNote {
        SoapNote {
            subjective: "Patient reports headache for 3 days.".into(),
            objective: "BP 120/80, temp 98.6F.".into(),
            assessment: "Tension headache.".into(),
            plan: "Ibuprofen 400mg TID.".into(),
        }
    }

    #[test]
    fn test_keyword_extract_headache_scenario() {
        let note = headache_note();
        let entities = keyword_extract(&note.assessment_and_plan());

        assert!(entities.problems.iter().any(|e| e.text == "Headache"));
        assert!(entities.medications.iter().any(|e| e.text == "Ibuprofen"));
    }

    #[test]
    fn test_keyword_extract_is_deterministic() {
        let text = "Hypertension and chest pain. Start aspirin. Check troponin and EKG.";
        let first = keyword_extract(text);
        let second = keyword_extract(text);
        assert_eq!(first, second);
    }

    #[test]
    fn test_keyword_extract_demo_coding() {
        let entities = keyword_extract("History of chest pain. Continue aspirin.");

        let problem = entities
            .problems
            .iter()
            .find(|e| e.text == "Chest Pain")
            .unwrap();
        assert_eq!(problem.code, "DEMO-CHEST-PAIN");
        assert_eq!(problem.code_system, "ICD-10-CM");
        assert_eq!(problem.confidence, 0.85);

        let medication = entities
            .medications
            .iter()
            .find(|e| e.text == "Aspirin")
            .unwrap();
        assert_eq!(medication.code_system, "RxNorm");
        assert_eq!(medication.confidence, 0.90);
    }

    #[test]
    fn test_keyword_extract_at_most_one_entity_per_keyword() {
        let entities = keyword_extract("aspirin in the morning and aspirin at night");
        let matches: Vec<_> = entities
            .medications
            .iter()
            .filter(|e| e.text == "Aspirin")
            .collect();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_counts_consistent_with_extraction() {
        let note = headache_note();
        let entities = keyword_extract(&note.assessment_and_plan());
        let counts = entities.counts();

        assert_eq!(counts.problems, entities.problems.len());
        assert_eq!(counts.procedures, entities.procedures.len());
        assert_eq!(counts.medications, entities.medications.len());
        assert_eq!(counts.labs, entities.labs.len());
    }

    #[test]
    fn test_context_window_adds_ellipses_when_truncated() {
        let text = "a".repeat(200);
        let context = context_window(&text, 100, 1, 10);
        assert!(context.starts_with("..."));
        assert!(context.ends_with("..."));
    }

    #[test]
    fn test_context_window_whole_text_without_ellipses() {
        let context = context_window("short text", 0, 5, 50);
        assert_eq!(context, "short text");
    }

    #[test]
    fn test_context_window_survives_multibyte_text() {
        let text = "température élevée chez le patient";
        let context = context_window(text, 0, 11, 5);
        assert!(!context.is_empty());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("chest pain"), "Chest Pain");
        assert_eq!(title_case("ekg"), "Ekg");
    }

    #[test]
    fn test_route_entities_filters_assertion_and_generic_mentions() {
        let response = ExtractionRes {
            entities: vec![
                RawEntity {
                    text: "hypertension".into(),
                    semantic: "problem".into(),
                    assertion: "present".into(),
                    begin: 0,
                    end: 12,
                    codemaps: Codemaps {
                        imo: Some(ImoCodemap {
                            lexical_code: "12345".into(),
                            lexical_title: "Hypertension".into(),
                            confidence: 0.97,
                        }),
                    },
                },
                RawEntity {
                    text: "pneumonia".into(),
                    semantic: "problem".into(),
                    assertion: "absent".into(),
                    begin: 0,
                    end: 9,
                    codemaps: Codemaps::default(),
                },
                RawEntity {
                    text: "patient education".into(),
                    semantic: "procedure".into(),
                    assertion: "present".into(),
                    begin: 0,
                    end: 17,
                    codemaps: Codemaps::default(),
                },
            ],
        };

        let collection = route_entities(response, "hypertension noted in the record");
        assert_eq!(collection.problems.len(), 1);
        assert!(collection.procedures.is_empty());
        assert_eq!(collection.problems[0].code, "12345");
        assert_eq!(collection.problems[0].code_system, "IMO");
    }

    #[test]
    fn test_route_entities_semantic_category_mapping() {
        let raw = |text: &str, semantic: &str| RawEntity {
            text: text.into(),
            semantic: semantic.into(),
            assertion: "present".into(),
            begin: 0,
            end: text.len(),
            codemaps: Codemaps::default(),
        };

        let response = ExtractionRes {
            entities: vec![
                raw("angina", "problem.condition"),
                raw("stent", "procedure"),
                raw("aspirin", "medication"),
                raw("troponin", "lab.test"),
            ],
        };

        let collection = route_entities(response, "angina stent aspirin troponin");
        assert_eq!(collection.counts().problems, 1);
        assert_eq!(collection.counts().procedures, 1);
        assert_eq!(collection.counts().medications, 1);
        assert_eq!(collection.counts().labs, 1);
    }

    #[tokio::test]
    async fn test_extract_without_credentials_uses_fallback() {
        let extractor = EntityExtractor::new(&crate::ScribeConfig::default());
        let outcome = extractor.extract(&headache_note()).await;

        assert_eq!(outcome.provenance, crate::Provenance::Fallback);
        assert!(!outcome.entities.problems.is_empty());
    }

    #[tokio::test]
    async fn test_extract_empty_note_yields_empty_collection() {
        let extractor = EntityExtractor::new(&crate::ScribeConfig::default());
        let empty = SoapNote {
            subjective: "something".into(),
            objective: String::new(),
            assessment: String::new(),
            plan: String::new(),
        };

        let outcome = extractor.extract(&empty).await;
        assert!(outcome.entities.is_empty());
    }
}
