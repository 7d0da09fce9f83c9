//! Pipeline data carriers: SOAP notes, extracted entities, and derived counts.
//!
//! None of these types has an identity beyond a single request/response cycle: they
//! are constructed in a handler, serialised, and discarded. There is no persistence
//! and no cross-request state.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A four-section clinical note (Subjective, Objective, Assessment, Plan).
///
/// Produced once per transcript and immutable after creation. All four fields are
/// always present; any of them may be an empty string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SoapNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl SoapNote {
    /// Concatenates the assessment and plan sections.
    ///
    /// Entity extraction operates only on these two sections; the subjective and
    /// objective sections are never submitted to the extraction service.
    pub fn assessment_and_plan(&self) -> String {
        format!("{}\n{}", self.assessment, self.plan)
    }
}

/// A single extracted clinical entity.
///
/// Carries the display text plus the coding metadata the extraction API reports.
/// Fallback-produced entities use `DEMO-` codes with fixed per-category code systems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Entity {
    /// Display text of the mention.
    pub text: String,
    /// Terminology code, or an empty string when none was reported.
    pub code: String,
    /// Coding system the code belongs to (e.g. `ICD-10-CM`, `RxNorm`, `IMO`).
    pub code_system: String,
    /// Human-readable description of the coded concept.
    pub description: String,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f64,
    /// Surrounding text of the mention, truncated with ellipses.
    pub context: String,
}

/// Extracted entities grouped into the four fixed clinical categories.
///
/// Derived solely from the assessment and plan sections of a [`SoapNote`] and never
/// mutated after creation. Order within each category follows discovery order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntityCollection {
    pub problems: Vec<Entity>,
    pub procedures: Vec<Entity>,
    pub medications: Vec<Entity>,
    pub labs: Vec<Entity>,
}

impl EntityCollection {
    /// Derives per-category counts from this collection.
    ///
    /// Counts are recomputed on every call and never stored independently, so they
    /// cannot drift from the collection they summarise.
    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            problems: self.problems.len(),
            procedures: self.procedures.len(),
            medications: self.medications.len(),
            labs: self.labs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
            && self.procedures.is_empty()
            && self.medications.is_empty()
            && self.labs.is_empty()
    }
}

/// Per-category entity counts, always derived from an [`EntityCollection`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntityCounts {
    pub problems: usize,
    pub procedures: usize,
    pub medications: usize,
    pub labs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(text: &str) -> Entity {
        Entity {
            text: text.into(),
            code: String::new(),
            code_system: "IMO".into(),
            description: text.into(),
            confidence: 0.9,
            context: String::new(),
        }
    }

    #[test]
    fn test_counts_match_collection_lengths() {
        let collection = EntityCollection {
            problems: vec![entity("Hypertension"), entity("Chest Pain")],
            procedures: vec![],
            medications: vec![entity("Aspirin")],
            labs: vec![entity("Troponin")],
        };

        let counts = collection.counts();
        assert_eq!(counts.problems, 2);
        assert_eq!(counts.procedures, 0);
        assert_eq!(counts.medications, 1);
        assert_eq!(counts.labs, 1);
    }

    #[test]
    fn test_empty_collection_reports_empty() {
        let collection = EntityCollection::default();
        assert!(collection.is_empty());
        assert_eq!(collection.counts().problems, 0);
    }

    #[test]
    fn test_assessment_and_plan_concatenation() {
        let note = SoapNote {
            subjective: "Headache for 3 days.".into(),
            objective: "BP 120/80.".into(),
            assessment: "Tension headache.".into(),
            plan: "Ibuprofen 400mg TID.".into(),
        };

        let text = note.assessment_and_plan();
        assert!(text.contains("Tension headache."));
        assert!(text.contains("Ibuprofen 400mg TID."));
        assert!(!text.contains("BP 120/80."));
    }

    #[test]
    fn test_soap_note_deserialisation_requires_all_sections() {
        let missing_plan = r#"{"subjective": "a", "objective": "b", "assessment": "c"}"#;
        assert!(serde_json::from_str::<SoapNote>(missing_plan).is_err());

        let complete = r#"{"subjective": "a", "objective": "b", "assessment": "c", "plan": ""}"#;
        let note: SoapNote = serde_json::from_str(complete).unwrap();
        assert_eq!(note.plan, "");
    }
}
