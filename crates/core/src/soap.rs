//! SOAP note generation: hosted model with a deterministic rule-based fallback.
//!
//! The live path posts the transcript to a chat-completions endpoint with a fixed
//! instructional preamble and expects a JSON object with the four section keys.
//! Any failure of that call — unreachable endpoint, non-2xx status, malformed or
//! incomplete payload — is absorbed by [`rule_based_note`], so generation itself
//! never fails; it degrades.

use std::time::Duration;

use scribe_types::Transcript;
use serde::Deserialize;

use crate::config::{ModelConfig, ScribeConfig};
use crate::error::{UpstreamError, UpstreamResult};
use crate::note::SoapNote;
use crate::Provenance;

/// Instructional preamble sent as the system message on every generation request.
const SOAP_PREAMBLE: &str = "You are a clinical scribe. Convert the encounter \
transcript provided by the user into a SOAP note. Respond with a single JSON object \
containing exactly the keys \"subjective\", \"objective\", \"assessment\" and \
\"plan\", each holding plain text. Do not include any other keys or commentary.";

/// Single-attempt timeout for the model call. No retries are performed; a timeout
/// selects the fallback like any other failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one generation: the note plus which path produced it.
#[derive(Clone, Debug)]
pub struct SoapOutcome {
    pub note: SoapNote,
    pub provenance: Provenance,
}

/// Service that turns a transcript into a [`SoapNote`].
///
/// Holds the outbound HTTP client and the optional model configuration. The service
/// is stateless across requests; it can be shared freely behind an `Arc`.
#[derive(Clone, Debug)]
pub struct SoapGenerator {
    client: reqwest::Client,
    model: Option<ModelConfig>,
}

impl SoapGenerator {
    /// Creates a generator from the startup configuration.
    pub fn new(config: &ScribeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: config.model().cloned(),
        }
    }

    /// Generates a SOAP note for the given transcript.
    ///
    /// This operation is infallible by design: when no model is configured, or when
    /// the model call fails in any way, the deterministic rule-based splitter is
    /// used instead and the failure is logged.
    pub async fn generate(&self, transcript: &Transcript) -> SoapOutcome {
        if let Some(model) = &self.model {
            match self.generate_live(model, transcript).await {
                Ok(note) => {
                    tracing::info!(model = %model.model, "SOAP note produced by hosted model");
                    return SoapOutcome {
                        note,
                        provenance: Provenance::Live,
                    };
                }
                Err(e) => {
                    tracing::warn!("model call failed, using rule-based fallback: {e}");
                }
            }
        } else {
            tracing::info!("no model credentials configured, using rule-based fallback");
        }

        SoapOutcome {
            note: rule_based_note(transcript.as_str()),
            provenance: Provenance::Fallback,
        }
    }

    /// Posts the transcript to the chat-completions endpoint and parses the reply.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if:
    /// - the request fails or times out,
    /// - the endpoint returns a non-2xx status,
    /// - the completion contains no choices, or
    /// - the completion text is not a JSON object with all four section keys.
    async fn generate_live(
        &self,
        model: &ModelConfig,
        transcript: &Transcript,
    ) -> UpstreamResult<SoapNote> {
        let body = serde_json::json!({
            "model": model.model,
            "messages": [
                { "role": "system", "content": SOAP_PREAMBLE },
                { "role": "user", "content": transcript.as_str() },
            ],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(&model.endpoint)
            .bearer_auth(&model.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: ChatCompletionRes = response.json().await?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::Payload("completion contained no choices".into()))?;

        parse_note_json(&content)
    }
}

#[derive(Deserialize)]
struct ChatCompletionRes {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Parses the model's reply into a [`SoapNote`].
///
/// All four section keys must be present; a partial note is treated as a malformed
/// payload so the caller falls back rather than returning a truncated note.
fn parse_note_json(content: &str) -> UpstreamResult<SoapNote> {
    serde_json::from_str(strip_code_fence(content)).map_err(|e| {
        UpstreamError::Payload(format!("completion was not a valid SOAP note object: {e}"))
    })
}

/// Removes a surrounding Markdown code fence, which some models add around JSON.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Sentence-level markers that route a sentence to the plan section.
const PLAN_MARKERS: &[&str] = &[
    "plan",
    "prescrib",
    "recommend",
    "follow up",
    "follow-up",
    "refer",
    "discharge",
    "continue",
    "will start",
];

/// Sentence-level markers that route a sentence to the assessment section.
const ASSESSMENT_MARKERS: &[&str] = &[
    "diagnosis",
    "diagnosed",
    "assessment",
    "impression",
    "likely",
    "consistent with",
    "rule out",
    "differential",
];

/// Vocabulary fragments that mark a sentence as containing measurements or findings.
const MEASUREMENT_MARKERS: &[&str] = &[
    "bp ",
    "blood pressure",
    "heart rate",
    "pulse",
    "temp",
    "mmhg",
    "bpm",
    "respiratory rate",
    "saturation",
    "o2",
    "exam",
];

/// Deterministic rule-based decomposition of a transcript into a SOAP note.
///
/// Heuristics, in priority order per sentence:
/// 1. the opening sentence is always subjective (it introduces the complaint),
/// 2. plan wording (prescriptions, follow-up, referrals) → plan,
/// 3. diagnostic wording → assessment,
/// 4. measurement-like sentences (digits alongside vitals vocabulary, a slash as in
///    `120/80`, or a percent sign) → objective,
/// 5. everything else → subjective.
///
/// The same input always yields the same note. Sections with no matching sentences
/// are left as empty strings.
pub fn rule_based_note(text: &str) -> SoapNote {
    let mut subjective: Vec<&str> = Vec::new();
    let mut objective: Vec<&str> = Vec::new();
    let mut assessment: Vec<&str> = Vec::new();
    let mut plan: Vec<&str> = Vec::new();

    for (index, sentence) in split_sentences(text).into_iter().enumerate() {
        let lower = sentence.to_lowercase();
        if index == 0 {
            subjective.push(sentence);
        } else if PLAN_MARKERS.iter().any(|m| lower.contains(m)) {
            plan.push(sentence);
        } else if ASSESSMENT_MARKERS.iter().any(|m| lower.contains(m)) {
            assessment.push(sentence);
        } else if looks_like_measurement(&lower) {
            objective.push(sentence);
        } else {
            subjective.push(sentence);
        }
    }

    SoapNote {
        subjective: subjective.join(" "),
        objective: objective.join(" "),
        assessment: assessment.join(" "),
        plan: plan.join(" "),
    }
}

/// A sentence "looks like a measurement" when it contains a digit together with
/// vitals vocabulary, a slash (as in `120/80`), or a percent sign.
fn looks_like_measurement(lower: &str) -> bool {
    if !lower.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    lower.contains('/') || lower.contains('%') || MEASUREMENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Splits text into trimmed sentences on `.`, `!`, `?` followed by whitespace, and on
/// line breaks. Decimal numbers (`98.6`) do not split because the period is not
/// followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, b) in bytes.iter().enumerate() {
        let boundary = match b {
            b'\n' => true,
            b'.' | b'!' | b'?' => bytes
                .get(i + 1)
                .map_or(true, |next| next.is_ascii_whitespace()),
            _ => false,
        };
        if boundary {
            let sentence = text[start..=i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = i + 1;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADACHE_TRANSCRIPT: &str = "Patient reports headache for 3 days. \
        BP 120/80, temp 98.6F. Diagnosis: tension headache. Plan: ibuprofen 400mg TID.";

    #[test]
    fn test_rule_based_note_headache_scenario() {
        let note = rule_based_note(HEADACHE_TRANSCRIPT);

        assert!(!note.subjective.is_empty());
        assert!(!note.objective.is_empty());
        assert!(!note.assessment.is_empty());
        assert!(!note.plan.is_empty());

        assert!(note.subjective.contains("headache for 3 days"));
        assert!(note.objective.contains("BP 120/80"));
        assert!(note.assessment.contains("tension headache"));
        assert!(note.plan.contains("ibuprofen"));
    }

    #[test]
    fn test_rule_based_note_is_deterministic() {
        let first = rule_based_note(HEADACHE_TRANSCRIPT);
        let second = rule_based_note(HEADACHE_TRANSCRIPT);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rule_based_note_opening_sentence_is_subjective() {
        // Even a measurement-like opener belongs to the subjective section.
        let note = rule_based_note("BP was 180/110 at home this morning. Feeling dizzy.");
        assert!(note.subjective.starts_with("BP was 180/110"));
    }

    #[test]
    fn test_rule_based_note_unmatched_sections_are_empty() {
        let note = rule_based_note("I have felt tired for a week. Nothing helps.");
        assert!(note.objective.is_empty());
        assert!(note.assessment.is_empty());
        assert!(note.plan.is_empty());
        assert!(!note.subjective.is_empty());
    }

    #[test]
    fn test_split_sentences_handles_decimals_and_newlines() {
        let sentences = split_sentences("Temp 98.6 recorded.\nNo fever today. Stable.");
        assert_eq!(
            sentences,
            vec!["Temp 98.6 recorded.", "No fever today.", "Stable."]
        );
    }

    #[test]
    fn test_parse_note_json_accepts_plain_object() {
        let content = r#"{"subjective": "s", "objective": "o", "assessment": "a", "plan": "p"}"#;
        let note = parse_note_json(content).unwrap();
        assert_eq!(note.assessment, "a");
    }

    #[test]
    fn test_parse_note_json_strips_code_fence() {
        let content = "```json\n{\"subjective\": \"s\", \"objective\": \"o\", \
            \"assessment\": \"a\", \"plan\": \"p\"}\n```";
        let note = parse_note_json(content).unwrap();
        assert_eq!(note.plan, "p");
    }

    #[test]
    fn test_parse_note_json_rejects_partial_note() {
        let content = r#"{"subjective": "s"}"#;
        assert!(parse_note_json(content).is_err());
    }

    #[tokio::test]
    async fn test_generate_without_model_uses_fallback() {
        let generator = SoapGenerator::new(&crate::ScribeConfig::default());
        let transcript = scribe_types::Transcript::new(HEADACHE_TRANSCRIPT).unwrap();

        let outcome = generator.generate(&transcript).await;
        assert_eq!(outcome.provenance, crate::Provenance::Fallback);
        assert!(outcome.note.plan.contains("ibuprofen"));
    }
}
