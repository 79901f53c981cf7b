//! Extraction Engine — turns free-form evaluator output into an `EvaluationRecord`.
//!
//! This is the only place untyped model text is interpreted. Every field runs its own
//! ordered strategy chain (labeled score → keyword-windowed score; bold section →
//! keyword-anchored prose), first hit wins. A validation pass then replaces missing or
//! too-short sections with deterministic sentences. `extract` never fails: internal
//! faults produce a fully defaulted record with `error_flag` set.

pub mod strategies;
pub mod validation;

use std::iter;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::pipeline::context::HistoryEntry;
use crate::extraction::strategies::{
    bold_header_pattern, bold_section, keyword_pattern, labeled_score, labeled_score_pattern,
    prose_section, windowed_score,
};
use crate::extraction::validation::{
    cultural_fallback, recommendation_fallback, skill_fallback, summary_fallback,
    validate_section, MIN_ASSESSMENT_LEN, MIN_RECOMMENDATION_LEN, MIN_SUMMARY_LEN,
};

/// Neutral score used only by the full-failure fallback.
pub const NEUTRAL_SCORE: f64 = 5.0;
const FALLBACK_SUMMARY_CHARS: usize = 400;

// ────────────────────────────────────────────────────────────────────────────
// Output record
// ────────────────────────────────────────────────────────────────────────────

/// The structured result of one evaluation run, flat for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub skill_score: f64,
    pub cultural_score: f64,
    pub overall_score: f64,
    pub skill_assessment: String,
    pub cultural_assessment: String,
    pub summary: String,
    pub recommendation: String,
    /// Final text exactly as produced.
    pub raw_output: String,
    pub error_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefaultReason {
    NotFound,
    TooShort { len: usize, min: usize },
}

/// Per-field outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    Extracted(T),
    Defaulted { value: T, reason: DefaultReason },
}

impl<T> FieldValue<T> {
    pub fn value(&self) -> &T {
        match self {
            FieldValue::Extracted(v) => v,
            FieldValue::Defaulted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            FieldValue::Extracted(v) => v,
            FieldValue::Defaulted { value, .. } => value,
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, FieldValue::Extracted(_))
    }

    pub fn reason(&self) -> Option<&DefaultReason> {
        match self {
            FieldValue::Extracted(_) => None,
            FieldValue::Defaulted { reason, .. } => Some(reason),
        }
    }
}

/// Every field with its provenance, before flattening into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub skill_score: FieldValue<f64>,
    pub cultural_score: FieldValue<f64>,
    pub skill_assessment: FieldValue<String>,
    pub cultural_assessment: FieldValue<String>,
    pub summary: FieldValue<String>,
    pub recommendation: FieldValue<String>,
}

impl ExtractedFields {
    pub fn is_degraded(&self) -> bool {
        !(self.skill_score.is_extracted()
            && self.cultural_score.is_extracted()
            && self.skill_assessment.is_extracted()
            && self.cultural_assessment.is_extracted()
            && self.summary.is_extracted()
            && self.recommendation.is_extracted())
    }

    /// `overall = round((skill + cultural) / 2, 1)` only when both scores were
    /// extracted; otherwise 0.
    pub fn overall_score(&self) -> f64 {
        match (&self.skill_score, &self.cultural_score) {
            (FieldValue::Extracted(s), FieldValue::Extracted(c)) => round1((s + c) / 2.0),
            _ => 0.0,
        }
    }

    pub fn into_record(self, raw_output: &str) -> EvaluationRecord {
        let overall_score = self.overall_score();
        let error_flag = self.is_degraded();
        EvaluationRecord {
            skill_score: self.skill_score.into_value(),
            cultural_score: self.cultural_score.into_value(),
            overall_score,
            skill_assessment: self.skill_assessment.into_value(),
            cultural_assessment: self.cultural_assessment.into_value(),
            summary: self.summary.into_value(),
            recommendation: self.recommendation.into_value(),
            raw_output: raw_output.to_string(),
            error_flag,
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ────────────────────────────────────────────────────────────────────────────
// Profiles
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScoreRule {
    /// Fixed label for the labeled-field strategy, if the format has one.
    pub label: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SectionRule {
    pub bold_labels: Vec<String>,
    pub prose_keywords: Vec<String>,
}

/// Which labels and keywords a deployment's output format uses.
#[derive(Debug, Clone)]
pub struct ExtractionProfile {
    pub name: &'static str,
    pub skill_score: ScoreRule,
    pub cultural_score: ScoreRule,
    pub skill_assessment: SectionRule,
    pub cultural_assessment: SectionRule,
    pub summary: SectionRule,
    pub recommendation: SectionRule,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ExtractionProfile {
    /// Fixed-format output of a dedicated summary role.
    pub fn summary_labels() -> Self {
        Self {
            name: "summary_labels",
            skill_score: ScoreRule {
                label: Some("Skill Fit Score".to_string()),
                keywords: strings(&["skill", "technical"]),
            },
            cultural_score: ScoreRule {
                label: Some("Cultural Fit Score".to_string()),
                keywords: strings(&["cultural", "culture"]),
            },
            skill_assessment: SectionRule {
                bold_labels: strings(&["Skill Assessment Summary"]),
                prose_keywords: strings(&["skill", "technical"]),
            },
            cultural_assessment: SectionRule {
                bold_labels: strings(&["Cultural Assessment Summary"]),
                prose_keywords: strings(&["cultural", "culture"]),
            },
            summary: SectionRule {
                bold_labels: strings(&["Final Synthesis", "Overall Summary"]),
                prose_keywords: strings(&["synthesis", "summary", "overall"]),
            },
            recommendation: SectionRule {
                bold_labels: strings(&["Overall Recommendation"]),
                prose_keywords: strings(&["recommendation", "recommend"]),
            },
        }
    }

    /// Free prose from a coordinator role; no fixed labels.
    pub fn prose() -> Self {
        Self {
            name: "prose",
            skill_score: ScoreRule {
                label: None,
                keywords: strings(&["skill", "technical"]),
            },
            cultural_score: ScoreRule {
                label: None,
                keywords: strings(&["cultural", "culture"]),
            },
            skill_assessment: SectionRule {
                bold_labels: vec![],
                prose_keywords: strings(&["skill", "technical"]),
            },
            cultural_assessment: SectionRule {
                bold_labels: vec![],
                prose_keywords: strings(&["cultural", "culture"]),
            },
            summary: SectionRule {
                bold_labels: vec![],
                prose_keywords: strings(&["summary", "overall", "synthesis"]),
            },
            recommendation: SectionRule {
                bold_labels: vec![],
                prose_keywords: strings(&["recommendation", "recommend"]),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledScore {
    label: Option<Regex>,
    keywords: Vec<Regex>,
}

impl CompiledScore {
    fn compile(rule: &ScoreRule) -> Result<Self, regex::Error> {
        Ok(Self {
            label: rule.label.as_deref().map(labeled_score_pattern).transpose()?,
            keywords: rule
                .keywords
                .iter()
                .map(|k| keyword_pattern(k))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Strategy-major: the labeled pattern is tried against every source before the
    /// keyword window is tried against any of them.
    fn find(&self, sources: &[&str]) -> Option<f64> {
        self.label
            .as_ref()
            .and_then(|label| sources.iter().find_map(|text| labeled_score(text, label)))
            .or_else(|| {
                sources
                    .iter()
                    .find_map(|text| windowed_score(text, &self.keywords))
            })
    }
}

#[derive(Debug, Clone)]
struct CompiledSection {
    headers: Vec<Regex>,
    prose_keywords: Vec<String>,
}

impl CompiledSection {
    fn compile(rule: &SectionRule) -> Result<Self, regex::Error> {
        Ok(Self {
            headers: rule
                .bold_labels
                .iter()
                .map(|l| bold_header_pattern(l))
                .collect::<Result<_, _>>()?,
            prose_keywords: rule.prose_keywords.clone(),
        })
    }

    /// Bold headers across all sources first, then keyword-anchored prose.
    fn find(&self, sources: &[&str]) -> Option<String> {
        self.headers
            .iter()
            .find_map(|h| sources.iter().find_map(|text| bold_section(text, h)))
            .or_else(|| {
                sources
                    .iter()
                    .find_map(|text| prose_section(text, &self.prose_keywords))
            })
    }
}

#[derive(Debug, Clone)]
struct CompiledProfile {
    skill_score: CompiledScore,
    cultural_score: CompiledScore,
    skill_assessment: CompiledSection,
    cultural_assessment: CompiledSection,
    summary: CompiledSection,
    recommendation: CompiledSection,
}

impl CompiledProfile {
    fn compile(p: &ExtractionProfile) -> Result<Self, regex::Error> {
        Ok(Self {
            skill_score: CompiledScore::compile(&p.skill_score)?,
            cultural_score: CompiledScore::compile(&p.cultural_score)?,
            skill_assessment: CompiledSection::compile(&p.skill_assessment)?,
            cultural_assessment: CompiledSection::compile(&p.cultural_assessment)?,
            summary: CompiledSection::compile(&p.summary)?,
            recommendation: CompiledSection::compile(&p.recommendation)?,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extractor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("evaluation output is empty")]
    EmptyOutput,

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct Extractor {
    profile: ExtractionProfile,
    compiled: CompiledProfile,
}

impl Extractor {
    /// Compiles every pattern of `profile` once; a bad label fails here, not per call.
    pub fn new(profile: ExtractionProfile) -> Result<Self, ExtractionError> {
        let compiled = CompiledProfile::compile(&profile)?;
        Ok(Self { profile, compiled })
    }

    pub fn extract(&self, final_text: &str) -> EvaluationRecord {
        self.extract_run(final_text, &[])
    }

    /// Extracts from `final_text`, falling back per field to intermediate role
    /// outputs (most recent first). Always returns a record.
    pub fn extract_run(&self, final_text: &str, history: &[HistoryEntry]) -> EvaluationRecord {
        match self.analyze(final_text, history) {
            Ok(fields) => {
                if fields.is_degraded() {
                    debug!("Extraction degraded ({} profile): {fields:?}", self.profile.name);
                }
                fields.into_record(final_text)
            }
            Err(e) => {
                warn!("Extraction failed, using fallback record: {e}");
                fallback_record(final_text)
            }
        }
    }

    /// Runs every strategy and the validation pass, keeping per-field provenance.
    pub fn analyze(
        &self,
        final_text: &str,
        history: &[HistoryEntry],
    ) -> Result<ExtractedFields, ExtractionError> {
        if final_text.trim().is_empty() {
            return Err(ExtractionError::EmptyOutput);
        }
        let c = &self.compiled;
        let sources: Vec<&str> = iter::once(final_text)
            .chain(history.iter().rev().map(|h| h.output.as_str()))
            .collect();

        let skill_score = score_field(c.skill_score.find(&sources));
        let cultural_score = score_field(c.cultural_score.find(&sources));
        let skill = *skill_score.value();
        let cultural = *cultural_score.value();

        let skill_assessment = validate_section(
            c.skill_assessment.find(&sources),
            MIN_ASSESSMENT_LEN,
            || skill_fallback(skill),
        );
        let cultural_assessment = validate_section(
            c.cultural_assessment.find(&sources),
            MIN_ASSESSMENT_LEN,
            || cultural_fallback(cultural),
        );
        let summary = validate_section(
            c.summary.find(&sources),
            MIN_SUMMARY_LEN,
            || summary_fallback(skill, cultural),
        );
        let recommendation = validate_section(
            c.recommendation.find(&sources),
            MIN_RECOMMENDATION_LEN,
            recommendation_fallback,
        );

        Ok(ExtractedFields {
            skill_score,
            cultural_score,
            skill_assessment,
            cultural_assessment,
            summary,
            recommendation,
        })
    }
}

fn score_field(found: Option<f64>) -> FieldValue<f64> {
    match found {
        Some(score) => FieldValue::Extracted(score),
        None => FieldValue::Defaulted {
            value: 0.0,
            reason: DefaultReason::NotFound,
        },
    }
}

/// Fully defaulted record for outputs the engine could not process at all.
pub fn fallback_record(raw_output: &str) -> EvaluationRecord {
    let summary = if raw_output.trim().is_empty() {
        "No evaluation output was produced.".to_string()
    } else if raw_output.chars().count() > FALLBACK_SUMMARY_CHARS {
        let head: String = raw_output.chars().take(FALLBACK_SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        raw_output.to_string()
    };

    EvaluationRecord {
        skill_score: NEUTRAL_SCORE,
        cultural_score: NEUTRAL_SCORE,
        overall_score: NEUTRAL_SCORE,
        skill_assessment: "Could not parse skill assessment".to_string(),
        cultural_assessment: "Could not parse cultural assessment".to_string(),
        summary,
        recommendation: "Manual review required".to_string(),
        raw_output: raw_output.to_string(),
        error_flag: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY_OUTPUT: &str = "Skill Fit Score: 8.5/10\n\
        Cultural Fit Score: 9/10\n\n\
        **Skill Assessment Summary:** Six years of digital marketing with strong SEO, SEM and \
        content strategy; has managed a small team and lifted lead generation by 35%.\n\n\
        **Cultural Assessment Summary:** Collaborative, people-first and a sustainability \
        advocate, which matches the company's open and purpose-driven culture well.\n\n\
        **Overall Recommendation:** Proceed to interview.\n\n\
        #### Final Synthesis\n\
        A strong, well-rounded candidate whose experience and values both line up with the role.";

    fn labels() -> Extractor {
        Extractor::new(ExtractionProfile::summary_labels()).unwrap()
    }

    #[test]
    fn test_summary_format_extracts_every_field() {
        let record = labels().extract(SUMMARY_OUTPUT);
        assert_eq!(record.skill_score, 8.5);
        assert_eq!(record.cultural_score, 9.0);
        assert_eq!(record.overall_score, 8.8);
        assert!(record.skill_assessment.starts_with("Six years of digital marketing"));
        assert!(record.cultural_assessment.starts_with("Collaborative, people-first"));
        assert_eq!(record.recommendation, "Proceed to interview.");
        assert!(record.summary.starts_with("A strong, well-rounded candidate"));
        assert_eq!(record.raw_output, SUMMARY_OUTPUT);
        assert!(!record.error_flag);
    }

    #[test]
    fn test_builtin_profiles_compile_once_and_analyze_only_fails_on_empty() {
        for profile in [ExtractionProfile::summary_labels(), ExtractionProfile::prose()] {
            let extractor = Extractor::new(profile).unwrap();
            assert!(extractor.analyze("no scores at all", &[]).is_ok());
            assert!(matches!(
                extractor.analyze(" ", &[]),
                Err(ExtractionError::EmptyOutput)
            ));
        }
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = labels();
        assert_eq!(extractor.extract(SUMMARY_OUTPUT), extractor.extract(SUMMARY_OUTPUT));
        let messy = "skill score: 12 and nothing else";
        assert_eq!(extractor.extract(messy), extractor.extract(messy));
    }

    #[test]
    fn test_empty_output_yields_full_fallback() {
        let record = labels().extract("");
        assert_eq!(record.skill_score, 5.0);
        assert_eq!(record.cultural_score, 5.0);
        assert_eq!(record.overall_score, 5.0);
        assert!(record.error_flag);
        assert_eq!(record.raw_output, "");
        assert_eq!(record.skill_assessment, "Could not parse skill assessment");
        assert!(!record.summary.is_empty());
    }

    #[test]
    fn test_whitespace_output_yields_full_fallback() {
        let record = labels().extract("  \n\t ");
        assert_eq!(record.overall_score, 5.0);
        assert_eq!(record.raw_output, "  \n\t ");
        assert!(record.error_flag);
    }

    #[test]
    fn test_out_of_range_score_near_keyword_clamps() {
        let record = labels().extract("The skill score: 12 is what I'd give.");
        assert_eq!(record.skill_score, 10.0);
        assert!(record.error_flag);
    }

    #[test]
    fn test_missing_component_zeroes_overall_and_flags() {
        let fields = labels()
            .analyze("Skill Fit Score: 7/10 and nothing about the other part.", &[])
            .unwrap();
        assert_eq!(fields.skill_score, FieldValue::Extracted(7.0));
        assert_eq!(fields.cultural_score.reason(), Some(&DefaultReason::NotFound));
        assert_eq!(fields.overall_score(), 0.0);
        let record = fields.into_record("raw");
        assert_eq!(record.overall_score, 0.0);
        assert_eq!(record.cultural_score, 0.0);
        assert!(record.error_flag);
    }

    #[test]
    fn test_short_assessment_replaced_with_score_sentence() {
        let text = "Skill Fit Score: 6/10\nCultural Fit Score: 7/10\n\
            **Skill Assessment Summary:** Decent.\n**Overall Recommendation:** Hold.";
        let record = labels().extract(text);
        assert_eq!(
            record.skill_assessment,
            "Skill assessment incomplete. Score: 6.0/10. Manual review recommended for technical qualifications."
        );
        assert_eq!(
            record.cultural_assessment,
            "Cultural assessment incomplete. Score: 7.0/10. Manual review recommended for cultural fit."
        );
        assert_eq!(record.overall_score, 6.5);
        assert!(record.error_flag);
    }

    #[test]
    fn test_missing_recommendation_is_synthesized() {
        let fields = labels().analyze("Skill Fit Score: 6/10", &[]).unwrap();
        assert_eq!(fields.recommendation.value(), "Manual review required.");
        assert_eq!(fields.recommendation.reason(), Some(&DefaultReason::NotFound));
    }

    #[test]
    fn test_fields_fall_back_to_intermediate_outputs() {
        let history = vec![
            HistoryEntry {
                role: "Skill Fit Agent".to_string(),
                output: "Skill fit 3/10".to_string(),
            },
            HistoryEntry {
                role: "Summary Agent".to_string(),
                output: SUMMARY_OUTPUT.to_string(),
            },
        ];
        let final_text = "#### Final Synthesis\nProceed: strong alignment on skills and values overall.";
        let record = labels().extract_run(final_text, &history);
        assert_eq!(record.skill_score, 8.5);
        assert_eq!(record.cultural_score, 9.0);
        assert_eq!(record.summary, "Proceed: strong alignment on skills and values overall.");
        assert_eq!(record.raw_output, final_text);
        assert!(!record.error_flag);
    }

    #[test]
    fn test_final_text_wins_over_history() {
        let history = vec![HistoryEntry {
            role: "Summary Agent".to_string(),
            output: "Skill Fit Score: 2/10".to_string(),
        }];
        let record = labels().extract_run("Skill Fit Score: 9/10", &history);
        assert_eq!(record.skill_score, 9.0);
    }

    #[test]
    fn test_labeled_history_beats_loose_final_text_window() {
        let history = vec![HistoryEntry {
            role: "Summary Agent".to_string(),
            output: "Skill Fit Score: 8/10\nCultural Fit Score: 9/10\n\
                **Overall Recommendation:** Proceed to interview."
                .to_string(),
        }];
        let final_text = "#### Final Synthesis\n\
            Cultural onboarding here is slow; one past hire rated it 3/10. Skill 8/10.\n\
            #### Recommendation\n\
            Hold until references are in.";
        let fields = labels().analyze(final_text, &history).unwrap();
        assert_eq!(fields.cultural_score, FieldValue::Extracted(9.0));
        assert_eq!(fields.skill_score, FieldValue::Extracted(8.0));
        assert_eq!(fields.overall_score(), 8.5);
        assert_eq!(fields.recommendation.value(), "Proceed to interview.");
    }

    #[test]
    fn test_prose_profile_reads_markdown_headings() {
        let text = "#### Skill Assessment\n\
            Score: 7/10. Solid SEO and SEM background with six years in digital marketing roles.\n\
            #### Cultural Assessment\n\
            Rated 8 out of 10. Collaborative style and sustainability interest fit the team culture.\n\
            #### Overall Summary\n\
            Strong candidate across both dimensions with minor gaps.\n\
            #### Recommendation\n\
            Proceed to interview.";
        let record = Extractor::new(ExtractionProfile::prose())
            .unwrap()
            .extract(text);
        assert_eq!(record.skill_score, 7.0);
        assert_eq!(record.cultural_score, 8.0);
        assert_eq!(record.overall_score, 7.5);
        assert!(record.skill_assessment.starts_with("Score: 7/10. Solid SEO"));
        assert!(record.cultural_assessment.starts_with("Rated 8 out of 10."));
        assert_eq!(record.summary, "Strong candidate across both dimensions with minor gaps.");
        assert_eq!(record.recommendation, "Proceed to interview.");
        assert!(!record.error_flag);
    }

    #[test]
    fn test_fallback_summary_truncates_long_output() {
        let long = "x".repeat(500);
        let record = fallback_record(&long);
        assert_eq!(record.summary.chars().count(), 403);
        assert!(record.summary.ends_with("..."));
        assert_eq!(record.raw_output, long);
    }

    #[test]
    fn test_scores_always_within_bounds() {
        let inputs = [
            "Skill Fit Score: 99/10 Cultural Fit Score: 0/10",
            "skill rating: 1000000 cultural score: 3",
            "technical 11 out of 10, culture 10.5/10",
            "Skill Fit Score: 8.5/10 ... Cultural Fit Score: 9/10",
        ];
        for input in inputs {
            let record = labels().extract(input);
            for score in [record.skill_score, record.cultural_score, record.overall_score] {
                assert!((0.0..=10.0).contains(&score), "{score} out of range for {input}");
            }
        }
    }

    #[test]
    fn test_overall_rounds_half_up() {
        let fields = labels()
            .analyze("Skill Fit Score: 8.5/10 ... Cultural Fit Score: 9/10", &[])
            .unwrap();
        assert_eq!(fields.overall_score(), 8.8);
    }
}
