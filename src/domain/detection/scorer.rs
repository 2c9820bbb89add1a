//! Deterministic quality scoring
//!
//! Scores a set of similarity-search results plus the input text itself into
//! a 0-10 composite. Pure: the same results and text always produce the same
//! score.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::quality::QualityAssessment;
use crate::domain::case_index::SearchResult;
use crate::domain::lexicon::FraudLexicon;

/// Weights and thresholds for quality scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Score at or above which a verdict is applied without verification
    #[serde(default = "default_min_acceptable_score")]
    pub min_acceptable_score: f64,
    /// Shortest input that earns any length credit
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Input length considered acceptable
    #[serde(default = "default_min_acceptable_length")]
    pub min_acceptable_length: usize,
    /// Input length considered good
    #[serde(default = "default_min_good_length")]
    pub min_good_length: usize,
    /// Inputs shorter than this are meaningless outright (absent fraud vocabulary)
    #[serde(default = "default_meaningless_min_length")]
    pub meaningless_min_length: usize,
}

fn default_min_acceptable_score() -> f64 {
    5.0
}

fn default_min_length() -> usize {
    10
}

fn default_min_acceptable_length() -> usize {
    20
}

fn default_min_good_length() -> usize {
    30
}

fn default_meaningless_min_length() -> usize {
    2
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_acceptable_score: default_min_acceptable_score(),
            min_length: default_min_length(),
            min_acceptable_length: default_min_acceptable_length(),
            min_good_length: default_min_good_length(),
            meaningless_min_length: default_meaningless_min_length(),
        }
    }
}

static SYMBOL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[!@#$%^&*()_+\-=\[\]{};':"\\|,.<>/?~]"#).expect("valid regex"));

/// Deterministic scorer over search results and input phrasing
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
    lexicon: FraudLexicon,
}

impl QualityScorer {
    pub fn new(config: QualityConfig, lexicon: FraudLexicon) -> Self {
        Self { config, lexicon }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &FraudLexicon {
        &self.lexicon
    }

    /// Assess the evidence quality for one request.
    ///
    /// Composite: top similarity carries 60% of a 10-point scale, the result
    /// count and the input phrasing carry 20% (0-2 points) each.
    pub fn assess(&self, results: &[SearchResult], input_text: &str) -> QualityAssessment {
        if results.is_empty() {
            return QualityAssessment::new(0.0, 0.0, 0)
                .with_reason("검색 결과가 없습니다")
                .with_suggestion("유사한 사례가 없어요. 새로운 사례로 등록해보세요")
                .with_acceptable(false)
                .with_improvement_steps(self.improvement_steps(0.0));
        }

        let top_score = results[0].score;
        let score = (f64::from(top_score) * 10.0 * 0.6
            + Self::count_score(results.len())
            + self.input_quality_score(input_text))
        .clamp(0.0, 10.0);

        let (reason, suggestion) = Self::describe(score);

        QualityAssessment::new(score, top_score, results.len())
            .with_reason(reason)
            .with_suggestion(suggestion)
            .with_acceptable(score >= self.config.min_acceptable_score)
            .with_improvement_steps(self.improvement_steps(score))
    }

    /// Result-count term: 0-2 points
    fn count_score(result_count: usize) -> f64 {
        if result_count >= 5 {
            2.0
        } else if result_count >= 3 {
            1.5
        } else if result_count >= 1 {
            1.0
        } else {
            0.0
        }
    }

    /// Input-phrasing term: 0-2 points.
    ///
    /// Meaningless input scores 0; input without any fraud vocabulary scores
    /// a flat 0.5; otherwise four sub-scores, each capped at 0.5.
    pub fn input_quality_score(&self, input: &str) -> f64 {
        if self.is_meaningless_input(input) {
            return 0.0;
        }

        if !self.lexicon.contains_fraud_keyword(input) {
            return 0.5;
        }

        self.length_score(input)
            + self.question_score(input)
            + self.specificity_score(input)
            + self.platform_score(input)
    }

    /// Whether the input is noise rather than a case description.
    ///
    /// An input carrying fraud vocabulary is never meaningless, however short
    /// or oddly shaped.
    pub fn is_meaningless_input(&self, input: &str) -> bool {
        if self.lexicon.contains_fraud_keyword(input) {
            return false;
        }

        let trimmed = input.trim();
        let char_count = trimmed.chars().count();

        if char_count < self.config.meaningless_min_length {
            return true;
        }

        if has_triple_repeat(trimmed) {
            return true;
        }

        if self.lexicon.contains_greeting(trimmed) {
            return true;
        }

        // Inputs dominated by punctuation / symbols
        let symbol_count = SYMBOL_PATTERN.find_iter(trimmed).count();
        symbol_count as f64 > char_count as f64 * 0.7
    }

    fn length_score(&self, input: &str) -> f64 {
        let length = input.chars().count();

        if length >= self.config.min_good_length {
            0.5
        } else if length >= self.config.min_acceptable_length {
            0.3
        } else if length >= self.config.min_length {
            0.1
        } else {
            0.0
        }
    }

    fn question_score(&self, input: &str) -> f64 {
        let hits = self.lexicon.marker_hits(input, &self.lexicon.question_markers);
        (hits as f64 * 0.25).min(0.5)
    }

    fn specificity_score(&self, input: &str) -> f64 {
        let hits = self.lexicon.marker_hits(input, &self.lexicon.specificity_markers);
        (hits as f64 * 0.2).min(0.5)
    }

    fn platform_score(&self, input: &str) -> f64 {
        let hits = self.lexicon.marker_hits(input, &self.lexicon.platform_markers);
        (hits as f64 * 0.2).min(0.5)
    }

    fn describe(score: f64) -> (&'static str, &'static str) {
        if score >= 8.0 {
            (
                "검색 결과가 매우 높은 관련성을 보임",
                "분석 결과를 신뢰할 수 있습니다",
            )
        } else if score >= 6.0 {
            (
                "검색 결과가 양호한 관련성을 보임",
                "결과를 참고하되 추가 검증을 권장합니다",
            )
        } else if score >= 4.0 {
            (
                "검색 결과가 제한적인 관련성을 보임",
                "더 구체적인 상황을 설명해주세요",
            )
        } else {
            (
                "검색 결과의 관련성이 낮음",
                "다른 키워드나 표현으로 재검색해보세요",
            )
        }
    }

    /// Ordered suggestions for making the input more searchable
    fn improvement_steps(&self, score: f64) -> Vec<String> {
        let mut steps = Vec::new();

        if score < 5.0 {
            steps.push("사건이 발생한 시간, 장소, 플랫폼을 함께 적어주세요".to_string());
            steps.push("상대방이 요구한 의심스러운 행동을 구체적으로 설명해주세요".to_string());
        }

        if score < 7.0 {
            steps.push("오간 금액이나 계좌 정보가 있다면 함께 적어주세요".to_string());
            steps.push("연락이 온 채널(전화, 문자, 메신저)을 적어주세요".to_string());
        }

        steps
    }
}

fn has_triple_repeat(input: &str) -> bool {
    let chars: Vec<char> = input.chars().collect();
    chars
        .windows(3)
        .any(|w| w[0] == w[1] && w[1] == w[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> QualityScorer {
        QualityScorer::new(QualityConfig::default(), FraudLexicon::default())
    }

    fn results_at(top: f32, count: usize) -> Vec<SearchResult> {
        (0..count)
            .map(|i| SearchResult::new(format!("case-{i}"), top - i as f32 * 0.05))
            .collect()
    }

    #[test]
    fn test_empty_results_score_zero() {
        let assessment = scorer().assess(&[], "아무 입력");

        assert_eq!(assessment.overall_score, 0.0);
        assert_eq!(
            assessment.grade,
            crate::domain::detection::quality::QualityGrade::Unacceptable
        );
        assert!(!assessment.is_acceptable);
        assert!(assessment.suggestion.contains("새로운 사례로 등록"));
        assert!(!assessment.improvement_steps.is_empty());
    }

    #[test]
    fn test_weighted_formula() {
        let scorer = scorer();
        let input = "카카오톡으로 받은 링크를 클릭했는데 계좌 비밀번호를 요구했어요";
        let results = results_at(0.85, 5);

        let assessment = scorer.assess(&results, input);

        // similarity term 0.85 * 6.0 = 5.1, count term 2.0, input term 0-2
        let expected = 0.85f64 * 6.0 + 2.0 + scorer.input_quality_score(input);
        assert!((assessment.overall_score - expected).abs() < 1e-9);
        assert!(assessment.overall_score >= 8.0);
        assert_eq!(assessment.result_count, 5);
        assert!((assessment.top_similarity_score - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_assessment_is_pure() {
        let scorer = scorer();
        let input = "문자로 온 링크를 클릭했어요";
        let results = results_at(0.6, 3);

        let a = scorer.assess(&results, input);
        let b = scorer.assess(&results, input);

        assert_eq!(a.overall_score, b.overall_score);
        assert_eq!(a.grade, b.grade);
        assert_eq!(a.improvement_steps, b.improvement_steps);
    }

    #[test]
    fn test_count_score_steps() {
        assert_eq!(QualityScorer::count_score(7), 2.0);
        assert_eq!(QualityScorer::count_score(5), 2.0);
        assert_eq!(QualityScorer::count_score(4), 1.5);
        assert_eq!(QualityScorer::count_score(3), 1.5);
        assert_eq!(QualityScorer::count_score(2), 1.0);
        assert_eq!(QualityScorer::count_score(1), 1.0);
        assert_eq!(QualityScorer::count_score(0), 0.0);
    }

    #[test]
    fn test_fraud_keyword_is_never_meaningless() {
        let scorer = scorer();

        // Two characters, but a recognized fraud keyword
        assert!(!scorer.is_meaningless_input("사기"));
        assert!(!scorer.is_meaningless_input("피싱"));
        // Even with a repeated-character tail
        assert!(!scorer.is_meaningless_input("사기ㅋㅋㅋ"));
    }

    #[test]
    fn test_meaningless_patterns() {
        let scorer = scorer();

        assert!(scorer.is_meaningless_input("똥"));
        assert!(scorer.is_meaningless_input("ㅋㅋㅋ"));
        assert!(scorer.is_meaningless_input("안녕하세요"));
        assert!(scorer.is_meaningless_input("hello"));
        assert!(scorer.is_meaningless_input("?!?!?!?!"));
        assert!(!scorer.is_meaningless_input("중고나라에서 돈만 받고 물건을 안 보내요"));
    }

    #[test]
    fn test_input_quality_tiers() {
        let scorer = scorer();

        assert_eq!(scorer.input_quality_score("ㅋㅋㅋ"), 0.0);
        // No fraud vocabulary: flat 0.5
        assert_eq!(scorer.input_quality_score("오늘 점심 뭐 먹을까 고민됩니다"), 0.5);

        // Keyword-rich concrete description beats the flat tier
        let rich = "카카오톡으로 받은 링크를 클릭했는데 계좌 비밀번호를 요구했어요";
        assert!(scorer.input_quality_score(rich) > 0.5);
        assert!(scorer.input_quality_score(rich) <= 2.0);
    }

    #[test]
    fn test_improvement_steps_tiers() {
        let scorer = scorer();

        let low = scorer.assess(&results_at(0.2, 1), "의심되는 문자");
        assert_eq!(low.improvement_steps.len(), 4);
        assert!(low.improvement_steps[0].contains("시간, 장소, 플랫폼"));

        let mid = scorer.assess(&results_at(0.5, 5), "사기 같은 문자를 받았는데 어떻게 하죠?");
        assert!(mid.overall_score >= 5.0 && mid.overall_score < 7.0);
        assert_eq!(mid.improvement_steps.len(), 2);
        assert!(mid.improvement_steps[0].contains("금액"));

        let high = scorer.assess(
            &results_at(0.9, 5),
            "카카오톡으로 받은 링크를 클릭했는데 계좌 비밀번호를 요구했어요",
        );
        assert!(high.overall_score >= 7.0);
        assert!(high.improvement_steps.is_empty());
    }

    #[test]
    fn test_acceptability_uses_configured_minimum() {
        let config = QualityConfig {
            min_acceptable_score: 9.5,
            ..QualityConfig::default()
        };
        let scorer = QualityScorer::new(config, FraudLexicon::default());

        let assessment = scorer.assess(
            &results_at(0.9, 5),
            "카카오톡으로 받은 링크를 클릭했는데 계좌 비밀번호를 요구했어요",
        );

        // Good score, but below the raised acceptance bar
        assert!(assessment.overall_score >= 8.0);
        assert!(!assessment.is_acceptable);
    }
}
