//! Validation pass: sections that are missing or too short are replaced by a
//! deterministic sentence that cites the scores, and the field is marked defaulted.

use crate::extraction::{DefaultReason, FieldValue};

pub const MIN_ASSESSMENT_LEN: usize = 50;
pub const MIN_SUMMARY_LEN: usize = 30;
/// Any non-empty recommendation is accepted.
pub const MIN_RECOMMENDATION_LEN: usize = 1;

pub fn validate_section(
    found: Option<String>,
    min_len: usize,
    fallback: impl FnOnce() -> String,
) -> FieldValue<String> {
    match found {
        None => FieldValue::Defaulted {
            value: fallback(),
            reason: DefaultReason::NotFound,
        },
        Some(text) => {
            let len = text.chars().count();
            if len < min_len {
                FieldValue::Defaulted {
                    value: fallback(),
                    reason: DefaultReason::TooShort { len, min: min_len },
                }
            } else {
                FieldValue::Extracted(text)
            }
        }
    }
}

pub fn skill_fallback(skill_score: f64) -> String {
    format!(
        "Skill assessment incomplete. Score: {skill_score:.1}/10. Manual review recommended for technical qualifications."
    )
}

pub fn cultural_fallback(cultural_score: f64) -> String {
    format!(
        "Cultural assessment incomplete. Score: {cultural_score:.1}/10. Manual review recommended for cultural fit."
    )
}

pub fn summary_fallback(skill_score: f64, cultural_score: f64) -> String {
    format!(
        "Evaluation summary: Skill fit {skill_score:.1}/10, Cultural fit {cultural_score:.1}/10. See individual assessments for details."
    )
}

pub fn recommendation_fallback() -> String {
    "Manual review required.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_section_is_defaulted() {
        let v = validate_section(None, MIN_ASSESSMENT_LEN, || skill_fallback(8.5));
        assert_eq!(v.reason(), Some(&DefaultReason::NotFound));
        assert!(v.value().contains("Score: 8.5/10"));
    }

    #[test]
    fn test_short_section_is_defaulted_with_length() {
        let v = validate_section(Some("Good.".to_string()), MIN_ASSESSMENT_LEN, || {
            cultural_fallback(9.0)
        });
        assert_eq!(
            v.reason(),
            Some(&DefaultReason::TooShort { len: 5, min: 50 })
        );
        assert_eq!(
            v.value(),
            "Cultural assessment incomplete. Score: 9.0/10. Manual review recommended for cultural fit."
        );
    }

    #[test]
    fn test_threshold_counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let v = validate_section(Some(text.clone()), MIN_SUMMARY_LEN, || summary_fallback(1.0, 2.0));
        assert_eq!(v, FieldValue::Extracted(text));
    }

    #[test]
    fn test_summary_fallback_cites_both_scores() {
        assert_eq!(
            summary_fallback(8.0, 0.0),
            "Evaluation summary: Skill fit 8.0/10, Cultural fit 0.0/10. See individual assessments for details."
        );
    }
}
