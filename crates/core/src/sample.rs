//! Fixed sample transcript for the demo frontend.

/// Sample encounter transcript, embedded verbatim at compile time.
///
/// Returned unchanged on every call to the sample endpoint; there is no randomness
/// and no mutation.
pub const SAMPLE_TRANSCRIPT: &str = include_str!("../assets/sample_transcript.txt");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_transcript_is_non_empty() {
        assert!(!SAMPLE_TRANSCRIPT.trim().is_empty());
    }

    #[test]
    fn test_sample_transcript_exercises_the_fallback_vocabulary() {
        let note = crate::soap::rule_based_note(SAMPLE_TRANSCRIPT);
        let entities = crate::extract::keyword_extract(&note.assessment_and_plan());
        assert!(!entities.is_empty());
    }
}
