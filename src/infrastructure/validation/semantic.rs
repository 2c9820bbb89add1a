//! LLM-backed semantic validation and query rewriting
//!
//! The LLM is an optimization: every path through this module degrades to a
//! rule-based answer instead of surfacing an error to the pipeline.

use std::sync::Arc;

use tracing::warn;

use crate::config::LlmSettings;
use crate::domain::{
    LlmProvider, LlmRequest, QualityAssessment, QualityScorer, ValidationResult, ValidationType,
};

/// A single strategy for reading a classification out of raw LLM text
trait ResponseParser: Send + Sync {
    fn parse(&self, raw: &str) -> Option<ValidationResult>;
    fn name(&self) -> &'static str;
}

/// Strict JSON parse of the requested response shape
struct JsonParser;

impl ResponseParser for JsonParser {
    fn parse(&self, raw: &str) -> Option<ValidationResult> {
        let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
        let classification = value.get("classification")?.as_str()?;

        let validation_type = ValidationType::from_token(classification);
        if validation_type == ValidationType::LlmError {
            return None;
        }

        let reason = value
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("검증 완료")
            .to_string();
        let confidence = value
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.9);
        let suggestion = value
            .get("suggestion")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Some(ValidationResult::new(
            validation_type,
            reason,
            suggestion,
            confidence,
        ))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Case-insensitive scan for the classification tokens in free text.
/// INVALID_CASE must be probed before VALID_CASE, which it contains.
struct KeywordParser;

impl ResponseParser for KeywordParser {
    fn parse(&self, raw: &str) -> Option<ValidationResult> {
        let upper = raw.to_uppercase();

        if upper.contains("INVALID_CASE") {
            Some(ValidationResult::new(
                ValidationType::InvalidCase,
                "사기 사례와 무관한 요청 (키워드 기반)",
                "",
                0.7,
            ))
        } else if upper.contains("NEEDS_CLARIFICATION") {
            Some(ValidationResult::new(
                ValidationType::NeedsClarification,
                "맥락이 불분명함 (키워드 기반)",
                "",
                0.6,
            ))
        } else if upper.contains("VALID_CASE") {
            Some(ValidationResult::new(
                ValidationType::ValidCase,
                "검증 통과 (키워드 기반)",
                "",
                0.8,
            ))
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

/// Classifies input semantically and rewrites weak queries
pub struct SemanticValidator {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
    scorer: QualityScorer,
    parsers: Vec<Box<dyn ResponseParser>>,
}

impl std::fmt::Debug for SemanticValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticValidator")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.settings.model)
            .finish()
    }
}

impl SemanticValidator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings, scorer: QualityScorer) -> Self {
        Self {
            provider,
            settings,
            scorer,
            parsers: vec![Box::new(JsonParser), Box::new(KeywordParser)],
        }
    }

    /// Classify whether the input describes a fraud scenario.
    /// Never fails: LLM trouble comes back as a `LlmError` result.
    pub async fn validate(&self, input: &str) -> ValidationResult {
        let request = LlmRequest::builder()
            .user(self.validation_prompt(input))
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .build();

        match self.provider.chat(&self.settings.model, request).await {
            Ok(response) => self.parse_response(response.content()),
            Err(e) => {
                warn!("semantic validation call failed: {e}");
                ValidationResult::llm_error(format!("검증 호출 실패: {e}"))
            }
        }
    }

    /// Rewrite a weak query into a more searchable one. Errs when the LLM is
    /// unreachable or answers empty; the caller keeps the original query and
    /// can surface [`SemanticValidator::improvement_hint`] instead.
    pub async fn improve_query(
        &self,
        input: &str,
        prior: &QualityAssessment,
    ) -> Result<String, crate::domain::DomainError> {
        let request = LlmRequest::builder()
            .user(self.improvement_prompt(input, prior))
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .build();

        let response = self.provider.chat(&self.settings.model, request).await?;
        let rewritten = response.content().trim();

        if rewritten.is_empty() {
            return Err(crate::domain::DomainError::provider(
                self.provider.provider_name(),
                "query improvement returned empty text",
            ));
        }

        Ok(rewritten.to_string())
    }

    fn parse_response(&self, raw: &str) -> ValidationResult {
        for parser in &self.parsers {
            if let Some(result) = parser.parse(raw) {
                tracing::debug!(parser = parser.name(), "validation response parsed");
                return result;
            }
        }

        ValidationResult::llm_error("응답 형식을 파악할 수 없음")
    }

    fn validation_prompt(&self, input: &str) -> String {
        format!(
            r#"다음 입력이 피싱, 사기, 의심스러운 메시지, 링크, 계좌 정보 요구 등과 관련된 내용인지 판단하세요.
일반적인 인사말, 수학 문제, 게임 대화처럼 명백히 관련 없는 경우만 거부하세요.

입력: "{input}"

다음 중 하나로 분류하세요:
- VALID_CASE: 유효한 사기 사례 분석 요청
- INVALID_CASE: 사기 사례와 무관한 요청
- NEEDS_CLARIFICATION: 맥락이 불분명하여 추가 설명 필요

응답 형식 (JSON만 출력):
{{"classification": "VALID_CASE|INVALID_CASE|NEEDS_CLARIFICATION", "reason": "판단 근거", "confidence": 0.0, "suggestion": "사용자에게 제안할 내용"}}"#
        )
    }

    fn improvement_prompt(&self, input: &str, prior: &QualityAssessment) -> String {
        format!(
            r#"아래 사기 사례 설명은 유사 사례 검색 품질이 낮았습니다 (품질 점수 {:.1}/10).
검색이 잘 되도록 핵심 정보를 유지하면서 한 문장으로 다시 써주세요.
다시 쓴 문장만 출력하세요.

원본: "{input}""#,
            prior.overall_score
        )
    }

    /// Rule-based rewriting guidance for when the LLM path is unavailable
    pub fn improvement_hint(&self, input: &str) -> String {
        if self.scorer.is_meaningless_input(input) {
            "실제로 겪은 일을 문장으로 설명해주세요. 예: 택배 문자에 있던 링크를 눌렀더니 앱 설치를 요구했어요"
                .to_string()
        } else if !self.scorer.lexicon().contains_fraud_keyword(input) {
            "어떤 점이 사기로 의심되는지 함께 적어주세요. 예: 송금을 요구했다, 링크 클릭을 유도했다"
                .to_string()
        } else {
            format!("{input} (언제, 어디서, 어떤 방식으로 연락이 왔는지 덧붙여주세요)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::mock::MockLlmProvider;
    use crate::domain::{FraudLexicon, QualityConfig};

    fn validator(provider: MockLlmProvider) -> SemanticValidator {
        SemanticValidator::new(
            Arc::new(provider),
            LlmSettings::default(),
            QualityScorer::new(QualityConfig::default(), FraudLexicon::default()),
        )
    }

    fn assessment(score: f64) -> QualityAssessment {
        QualityAssessment::new(score, 0.2, 1)
    }

    #[tokio::test]
    async fn test_validate_parses_json_response() {
        let provider = MockLlmProvider::new("mock").with_response(
            r#"{"classification": "VALID_CASE", "reason": "금융 정보 요구 정황", "confidence": 0.92, "suggestion": ""}"#,
        );
        let validator = validator(provider);

        let result = validator.validate("계좌 비밀번호를 요구하는 문자를 받았어요").await;

        assert!(result.is_valid);
        assert_eq!(result.validation_type, ValidationType::ValidCase);
        assert!((result.confidence - 0.92).abs() < 1e-9);
        assert_eq!(result.reason, "금융 정보 요구 정황");
    }

    #[tokio::test]
    async fn test_validate_falls_back_to_keyword_scan() {
        let provider = MockLlmProvider::new("mock")
            .with_response("분류 결과는 INVALID_CASE 입니다. 인사말로 보입니다.");
        let validator = validator(provider);

        let result = validator.validate("안녕하세요").await;

        assert!(!result.is_valid);
        assert_eq!(result.validation_type, ValidationType::InvalidCase);
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_keyword_scan_probes_invalid_before_valid() {
        // "INVALID_CASE" contains "VALID_CASE"; the scan must not misread it
        let provider = MockLlmProvider::new("mock").with_response("INVALID_CASE");
        let result = validator(provider).validate("2 + 2 = ?").await;

        assert_eq!(result.validation_type, ValidationType::InvalidCase);
    }

    #[tokio::test]
    async fn test_unparseable_response_is_llm_error_with_zero_confidence() {
        let provider = MockLlmProvider::new("mock").with_response("글쎄요, 잘 모르겠네요.");
        let result = validator(provider).validate("입력").await;

        assert_eq!(result.validation_type, ValidationType::LlmError);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_valid);
    }

    #[tokio::test]
    async fn test_unknown_classification_token_is_llm_error() {
        let provider = MockLlmProvider::new("mock")
            .with_response(r#"{"classification": "MAYBE_CASE", "confidence": 0.9}"#);
        let result = validator(provider).validate("입력").await;

        // JSON parsed but the token is outside the closed mapping; the
        // keyword scan cannot rescue it either
        assert_eq!(result.validation_type, ValidationType::LlmError);
    }

    #[tokio::test]
    async fn test_provider_failure_is_llm_error() {
        let provider = MockLlmProvider::new("mock").with_error("connection reset");
        let result = validator(provider).validate("입력").await;

        assert_eq!(result.validation_type, ValidationType::LlmError);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_improve_query_uses_llm_rewrite() {
        let provider = MockLlmProvider::new("mock")
            .with_response("카카오톡 오픈채팅에서 투자를 권유받고 송금을 요구당했습니다");
        let validator = validator(provider);

        let improved = validator
            .improve_query("투자 얘기 들었는데", &assessment(3.0))
            .await
            .unwrap();

        assert_eq!(improved, "카카오톡 오픈채팅에서 투자를 권유받고 송금을 요구당했습니다");
    }

    #[tokio::test]
    async fn test_improve_query_fails_when_provider_unreachable() {
        let provider = MockLlmProvider::new("mock").with_error("timeout");
        let validator = validator(provider);

        let result = validator.improve_query("투자 얘기 들었는데", &assessment(3.0)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_improve_query_rejects_empty_rewrite() {
        let provider = MockLlmProvider::new("mock").with_response("   ");
        let validator = validator(provider);

        let result = validator.improve_query("투자 얘기 들었는데", &assessment(3.0)).await;

        assert!(result.is_err());
    }

    #[test]
    fn test_improvement_hint_for_meaningless_input() {
        let validator = validator(MockLlmProvider::new("mock"));

        assert!(validator.improvement_hint("ㅋㅋㅋ").contains("실제로 겪은 일"));
    }

    #[test]
    fn test_improvement_hint_for_non_fraud_input() {
        let validator = validator(MockLlmProvider::new("mock"));

        let hint = validator.improvement_hint("어제 모르는 사람한테 연락이 왔어요");
        assert!(hint.contains("사기로 의심"));
    }

    #[test]
    fn test_improvement_hint_generic_keeps_original() {
        let validator = validator(MockLlmProvider::new("mock"));

        let input = "사기 같은 문자를 받았어요";
        let hint = validator.improvement_hint(input);

        assert!(hint.starts_with(input));
        assert!(hint.contains("언제, 어디서"));
    }
}
