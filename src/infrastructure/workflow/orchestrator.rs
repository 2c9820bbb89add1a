//! Detection workflow orchestrator
//!
//! Sequences basic validation, optional LLM-backed semantic validation and
//! query rewriting, vector search, quality scoring and the final decision
//! over one mutable [`WorkflowState`]. The state machine only moves forward;
//! every failure mode ends up encoded in the returned state, never in an
//! error.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, warn};

use crate::config::DetectionConfig;
use crate::domain::{
    ActionType, CaseIndex, CostTracker, DecisionReason, DetectionStatus, QualityScorer, RiskLevel,
    SearchResult, ValidationResult, ValidationType, WorkflowState, WorkflowStatus, WorkflowStep,
};
use crate::infrastructure::validation::SemanticValidator;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// The detection decision pipeline
pub struct DetectionWorkflow {
    config: DetectionConfig,
    case_index: Arc<dyn CaseIndex>,
    scorer: QualityScorer,
    validator: SemanticValidator,
    cost_tracker: Arc<CostTracker>,
}

impl std::fmt::Debug for DetectionWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionWorkflow")
            .field("top_k", &self.config.index.top_k)
            .field("llm_enabled", &self.config.llm.enabled)
            .finish()
    }
}

impl DetectionWorkflow {
    pub fn new(
        config: DetectionConfig,
        case_index: Arc<dyn CaseIndex>,
        scorer: QualityScorer,
        validator: SemanticValidator,
        cost_tracker: Arc<CostTracker>,
    ) -> Self {
        Self {
            config,
            case_index,
            scorer,
            validator,
            cost_tracker,
        }
    }

    /// Run the pipeline for one request. Never fails: callers branch on the
    /// returned state's `status` and `action_type`.
    pub async fn execute(&self, input: &str) -> WorkflowState {
        let mut state = WorkflowState::initialize(input, self.config.max_attempts);
        state.add_log(format!("workflow started: {input}"));

        self.run_steps(&mut state).await;

        if !matches!(
            state.status,
            WorkflowStatus::Failed | WorkflowStatus::NeedsHumanIntervention
        ) {
            state.update_status(WorkflowStatus::Completed);
            state.add_log("workflow completed");
        }

        info!(
            status = %state.status,
            detection_status = ?state.detection_status,
            llm_used = state.llm_used,
            "detection workflow finished"
        );
        state
    }

    async fn run_steps(&self, state: &mut WorkflowState) {
        self.run_basic_validation(state);
        if Self::should_stop(state) {
            return;
        }

        self.run_llm_validation(state).await;
        if Self::should_stop(state) {
            return;
        }

        self.run_query_improvement(state).await;
        if Self::should_stop(state) {
            return;
        }

        self.run_vector_search(state).await;
        if Self::should_stop(state) {
            return;
        }

        self.run_quality_evaluation(state);
        if Self::should_stop(state) {
            return;
        }

        self.run_result_analysis(state);
    }

    fn should_stop(state: &WorkflowState) -> bool {
        matches!(
            state.status,
            WorkflowStatus::Failed | WorkflowStatus::NeedsHumanIntervention
        )
    }

    /// Step 1: rule-based input cleanup and rejection. Runs for every
    /// request; rejections stop the pipeline before any cost is incurred.
    fn run_basic_validation(&self, state: &mut WorkflowState) {
        state.update_step(WorkflowStep::BasicValidation);
        state.update_status(WorkflowStatus::InputValidating);

        let normalized = normalize_input(&state.current_input);
        if normalized != state.current_input {
            state.current_input = normalized;
            state.add_log(format!("input normalized: {}", state.current_input));
        }

        let input = state.current_input.clone();

        if input.is_empty() {
            state.input_validation = Some(ValidationResult::new(
                ValidationType::NeedsClarification,
                "입력이 비어 있음",
                "겪은 상황을 입력해주세요",
                1.0,
            ));
            state.detection_status = Some(DetectionStatus::Unknown);
            state.decision_reason = Some(DecisionReason::InputTooVague);
            state.fail("입력이 비어 있음", ActionType::AmbiguousInput);
            return;
        }

        // Meaningless noise outranks the length check: a one-character blob
        // is rejected as unrelated, not as too vague
        if self.scorer.is_meaningless_input(&input) {
            state.input_validation = Some(ValidationResult::new(
                ValidationType::InvalidCase,
                "의미 없는 입력으로 판정됨",
                "실제 겪은 사례를 문장으로 설명해주세요",
                0.9,
            ));
            state.detection_status = Some(DetectionStatus::Unknown);
            state.decision_reason = Some(DecisionReason::InputTooVague);
            state.fail("의미 없는 입력으로 판정됨", ActionType::InvalidInputCase);
            return;
        }

        let too_short = input.chars().count() < self.scorer.config().min_length;
        if too_short && !self.scorer.lexicon().contains_fraud_keyword(&input) {
            state.input_validation = Some(ValidationResult::new(
                ValidationType::NeedsClarification,
                "입력이 너무 짧아 분석할 수 없음",
                "상황을 조금 더 자세히 설명해주세요",
                0.9,
            ));
            state.detection_status = Some(DetectionStatus::Unknown);
            state.decision_reason = Some(DecisionReason::InputTooVague);
            state.fail("입력이 너무 짧아 분석할 수 없음", ActionType::AmbiguousInput);
            return;
        }

        // Rule-based pass; the LLM step may refine this verdict
        state.input_validation = Some(ValidationResult::new(
            ValidationType::ValidCase,
            "규칙 기반 검증 통과",
            "",
            0.6,
        ));
        state.add_log("basic validation passed");
    }

    /// Step 2: semantic validation through the LLM, gated by the usage
    /// counter and the cost budget. A degraded LLM never fails the pipeline.
    async fn run_llm_validation(&self, state: &mut WorkflowState) {
        if !self.config.llm.enabled {
            state.add_log("llm validation skipped: disabled");
            return;
        }

        if !state.should_use_llm() {
            state.add_log("llm validation skipped: already used this attempt");
            return;
        }

        let cost = self.cost_tracker.validation_call_cost();
        if !self.cost_tracker.can_make_call(cost) {
            state.decision_reason = Some(DecisionReason::CostLimitReached);
            state.add_log("llm validation skipped: cost budget exhausted");
            return;
        }

        state.update_step(WorkflowStep::LlmValidation);

        self.cost_tracker.record_call(cost);
        state.record_llm_call(cost);

        let validation = self.validator.validate(&state.current_input).await;
        state.llm_confidence = validation.confidence;

        match validation.validation_type {
            ValidationType::ValidCase => {
                state.add_log("llm validation passed");
                state.input_validation = Some(validation);
            }
            ValidationType::InvalidCase => {
                let reason = validation.reason.clone();
                if !validation.suggestion.is_empty() {
                    state.improvement_suggestions.push(validation.suggestion.clone());
                }
                state.input_validation = Some(validation);
                state.detection_status = Some(DetectionStatus::Unknown);
                state.decision_reason = Some(DecisionReason::InputTooVague);
                state.fail(
                    format!("사기 사례와 무관한 입력: {reason}"),
                    ActionType::InvalidInputCase,
                );
            }
            ValidationType::NeedsClarification => {
                let reason = validation.reason.clone();
                if !validation.suggestion.is_empty() {
                    state.improvement_suggestions.push(validation.suggestion.clone());
                }
                state.input_validation = Some(validation);
                state.detection_status = Some(DetectionStatus::Unknown);
                state.decision_reason = Some(DecisionReason::InputTooVague);
                state.fail(
                    format!("맥락이 불분명한 입력: {reason}"),
                    ActionType::AmbiguousInput,
                );
            }
            ValidationType::LlmError => {
                // Keep the rule-based verdict from step 1 and move on
                warn!("llm validation degraded: {}", validation.reason);
                state.add_log(format!(
                    "llm validation degraded, keeping rule-based verdict: {}",
                    validation.reason
                ));
            }
        }
    }

    /// Step 3: query rewriting. Only worthwhile when an earlier assessment
    /// scored the query poorly, and only while the LLM gate is still open.
    async fn run_query_improvement(&self, state: &mut WorkflowState) {
        let Some(prior) = state.quality_assessment.clone() else {
            state.add_log("query improvement skipped: no prior assessment");
            return;
        };

        if prior.overall_score >= self.config.low_quality_threshold {
            state.add_log("query improvement skipped: prior quality sufficient");
            return;
        }

        if !self.config.llm.enabled || !state.should_use_llm() {
            state.add_log("query improvement skipped: llm unavailable this attempt");
            return;
        }

        let cost = self.cost_tracker.query_improvement_cost();
        if !self.cost_tracker.can_make_call(cost) {
            state.decision_reason = Some(DecisionReason::CostLimitReached);
            state.add_log("query improvement skipped: cost budget exhausted");
            return;
        }

        state.update_step(WorkflowStep::QueryImprovement);
        state.update_status(WorkflowStatus::InputImproving);

        self.cost_tracker.record_call(cost);
        state.record_llm_call(cost);

        let improved = self.validator.improve_query(&state.current_input, &prior).await;
        match improved {
            Ok(rewritten) => {
                if rewritten != state.current_input {
                    state.add_log(format!("query rewritten: {rewritten}"));
                    state.current_input = rewritten;
                } else {
                    state.add_log("query rewrite returned the original text");
                }
            }
            Err(e) => {
                // Keep the original query; surface guidance instead
                let hint = self.validator.improvement_hint(&state.current_input);
                state.improvement_suggestions.push(hint);
                state.add_log(format!("query improvement failed, keeping original: {e}"));
            }
        }
    }

    /// Step 4: embed and search. The only step whose failure is fatal; there
    /// is no pipeline value without evidence.
    async fn run_vector_search(&self, state: &mut WorkflowState) {
        state.update_step(WorkflowStep::VectorSearch);
        state.update_status(WorkflowStatus::Searching);

        let embedded = self.case_index.embed(&state.current_input).await;
        let vector = match embedded {
            Ok(vector) => {
                state.add_log("embedding generated");
                vector
            }
            Err(e) => {
                error!("embedding failed: {e}");
                state.fail(format!("임베딩 실패: {e}"), ActionType::SearchFailure);
                return;
            }
        };

        match self
            .case_index
            .search(&vector, self.config.index.top_k)
            .await
        {
            Ok(results) => {
                state.result_count = results.len();
                state.top_similarity_score = results.first().map(|r| r.score).unwrap_or(0.0);
                state.add_log(format!(
                    "vector search done: {} results, top score {:.3}",
                    results.len(),
                    state.top_similarity_score
                ));
                state.search_results = results;
            }
            Err(e) => {
                error!("vector search failed: {e}");
                state.fail(format!("벡터 검색 실패: {e}"), ActionType::SearchFailure);
            }
        }
    }

    /// Step 5: score the evidence
    fn run_quality_evaluation(&self, state: &mut WorkflowState) {
        state.update_step(WorkflowStep::QualityEvaluation);
        state.update_status(WorkflowStatus::QualityAssessing);

        let assessment = self.scorer.assess(&state.search_results, &state.current_input);
        state.add_log(format!(
            "quality assessed: score {:.2} ({})",
            assessment.overall_score, assessment.grade
        ));
        state
            .improvement_suggestions
            .extend(assessment.improvement_steps.iter().cloned());
        state.quality_assessment = Some(assessment);
    }

    /// Step 6: the decision table
    fn run_result_analysis(&self, state: &mut WorkflowState) {
        state.update_step(WorkflowStep::ResultAnalysis);
        state.update_status(WorkflowStatus::DecisionMaking);

        let Some(quality) = state.quality_assessment.clone() else {
            state.fail(
                "품질 평가 결과 없이 의사결정 단계에 도달함",
                ActionType::QualityAssessmentFailure,
            );
            return;
        };

        let top_score = state.top_similarity_score;
        let input = state.current_input.clone();

        if state.search_results.is_empty() {
            self.decide_unknown(state, DecisionReason::NoResults, &input);
            state.next_action =
                Some("유사한 사례가 없어요. 커뮤니티에 공유해 의견을 들어보세요".to_string());
        } else if top_score < self.config.low_similarity_threshold {
            // Weak evidence caps how much the quality score may claim
            let capped = quality.capped_at(3.0);
            state.add_log(format!(
                "low similarity ({top_score:.3}), quality capped at {:.1}",
                capped.overall_score
            ));
            state.quality_assessment = Some(capped);
            self.decide_unknown(state, DecisionReason::LowQualityResults, &input);
            state.next_action = Some(
                "기존 사례와 충분히 유사하지 않아요. 커뮤니티 공유로 사례를 알려주세요".to_string(),
            );
        } else {
            let implied = implied_status(&state.search_results[0]);
            let score = quality.overall_score;
            state.detection_status = Some(implied);

            let (reason, action, next_action) = if score >= 8.0 {
                (
                    DecisionReason::HighQualityResults,
                    match implied {
                        DetectionStatus::Danger => ActionType::ImmediateAction,
                        DetectionStatus::Warning => ActionType::ManualReview,
                        _ => ActionType::Monitoring,
                    },
                    "분석 결과를 신뢰할 수 있습니다",
                )
            } else if score >= 6.0 {
                (
                    DecisionReason::MediumQualityResults,
                    ActionType::ManualReview,
                    "결과를 참고하되 추가 확인을 권장합니다",
                )
            } else if score >= 4.0 {
                (
                    DecisionReason::MixedSignals,
                    ActionType::ManualReview,
                    "신뢰도가 제한적입니다. 상황을 더 자세히 설명해주세요",
                )
            } else {
                (
                    DecisionReason::LowQualityResults,
                    ActionType::ManualReview,
                    "신뢰도가 낮습니다. 다른 표현으로 재검색하거나 수동 검토를 요청해주세요",
                )
            };

            state.decision_reason = Some(reason);
            state.action_type = Some(action);
            state.next_action = Some(next_action.to_string());
        }

        state.update_step(WorkflowStep::FinalDecision);

        let quality_score = state
            .quality_assessment
            .as_ref()
            .map(|q| q.overall_score)
            .unwrap_or(0.0);
        state.estimated_risk = Some(self.estimate_risk(quality_score, top_score, &input));

        state.add_log(format!(
            "final decision: {:?}, risk {:?}",
            state.detection_status, state.estimated_risk
        ));
    }

    /// Unknown verdict with a community-share recommendation
    fn decide_unknown(&self, state: &mut WorkflowState, reason: DecisionReason, input: &str) {
        state.detection_status = Some(DetectionStatus::Unknown);
        state.decision_reason = Some(reason);
        state.action_type = Some(ActionType::CommunityShare);
        state.should_share_community = true;

        let category_source = state
            .search_results
            .first()
            .and_then(|r| r.payload_str("CONTENT").map(|s| s.to_string()))
            .unwrap_or_else(|| input.to_string());
        state.community_categories = vec![self.scorer.lexicon().infer_category(&category_source)];

        let title: String = input.chars().take(40).collect();
        state.community_share_title = Some(format!("이런 사례를 겪었어요: {title}"));
        state.community_share_message = Some(
            "아직 등록되지 않은 유형이에요. 커뮤니티에 공유하면 다른 사용자들의 피해를 막을 수 있어요"
                .to_string(),
        );
    }

    /// Combine the quality-derived risk, the similarity floor and the
    /// keyword scan; the most severe signal wins.
    fn estimate_risk(&self, quality_score: f64, top_score: f32, input: &str) -> RiskLevel {
        let evidence_risk = if top_score < self.config.low_similarity_threshold {
            RiskLevel::High
        } else if quality_score >= 8.0 {
            RiskLevel::Low
        } else if quality_score >= 6.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        };

        let lexicon = self.scorer.lexicon();
        let keyword_risk = if lexicon.contains_high_risk_term(input) {
            RiskLevel::High
        } else if lexicon.contains_medium_risk_term(input) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        evidence_risk.max(keyword_risk)
    }
}

/// Collapse runs of whitespace and control characters into single spaces
fn normalize_input(input: &str) -> String {
    WHITESPACE.replace_all(input.trim(), " ").to_string()
}

/// The matched case's implied verdict: an explicit payload status when the
/// case carries one, else the similarity thresholds
fn implied_status(result: &SearchResult) -> DetectionStatus {
    if let Some(status) = result.payload_str("status") {
        match status.to_uppercase().as_str() {
            "SAFE" => return DetectionStatus::Safe,
            "WARNING" => return DetectionStatus::Warning,
            "DANGER" => return DetectionStatus::Danger,
            _ => {}
        }
    }

    if result.score >= 0.5 {
        DetectionStatus::Danger
    } else if result.score >= 0.3 {
        DetectionStatus::Warning
    } else {
        DetectionStatus::Safe
    }
}
