//! Shared fraud vocabulary
//!
//! The quality scorer, the semantic validator and the risk estimator all key
//! off the same word lists. Keeping them in one injectable value object
//! guarantees the components never diverge.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Case category used for community sharing and history grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseCategory {
    /// Marketplace / transaction fraud
    Transaction,
    /// Investment fraud
    Investment,
    /// Phishing
    Phishing,
    /// Impersonation
    Impersonation,
}

impl std::fmt::Display for CaseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transaction => write!(f, "transaction"),
            Self::Investment => write!(f, "investment"),
            Self::Phishing => write!(f, "phishing"),
            Self::Impersonation => write!(f, "impersonation"),
        }
    }
}

/// Word lists driving the rule-based heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudLexicon {
    /// Vocabulary that marks an input as fraud-related
    pub fraud_keywords: Vec<String>,
    /// Greeting phrases that mark an input as meaningless small talk
    pub greetings: Vec<String>,
    /// Terms that immediately imply high risk (credentials, money movement)
    pub high_risk_terms: Vec<String>,
    /// Terms that imply medium risk (links, contact channels)
    pub medium_risk_terms: Vec<String>,
    /// Markers of question intent
    pub question_markers: Vec<String>,
    /// Markers of a concrete incident description
    pub specificity_markers: Vec<String>,
    /// Platform / service names
    pub platform_markers: Vec<String>,
}

static DEFAULT_LEXICON: Lazy<FraudLexicon> = Lazy::new(|| FraudLexicon {
    fraud_keywords: to_owned(&[
        "피싱", "사기", "사칭", "의심", "이상", "수상", "메시지", "링크", "클릭",
        "계좌", "비밀번호", "카드", "결제", "은행", "금액", "송금", "이체",
        "이메일", "문자", "전화", "알림", "경고", "주의", "확인", "검증",
    ]),
    greetings: to_owned(&["안녕하세요", "안녕", "반갑습니다", "하이", "hi", "hello"]),
    high_risk_terms: to_owned(&["계좌", "비밀번호", "송금", "이체", "주민번호"]),
    medium_risk_terms: to_owned(&["링크", "클릭", "전화", "문자"]),
    question_markers: to_owned(&["?", "무엇", "어떻게"]),
    specificity_markers: to_owned(&[
        "받았는데", "보냈는데", "클릭했는데", "입력했는데",
        "가입했어요", "등록했어요", "요구합니다", "달라고",
        "소개받은", "추천받은",
    ]),
    platform_markers: to_owned(&[
        "이메일", "문자", "전화", "은행", "카드", "결제",
        "텔레그램", "라인", "카카오톡", "오픈채팅", "사이트", "앱",
        "인스타그램", "페이스북", "트위터",
    ]),
});

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for FraudLexicon {
    fn default() -> Self {
        DEFAULT_LEXICON.clone()
    }
}

impl FraudLexicon {
    /// Whether the input mentions any fraud-vocabulary keyword
    pub fn contains_fraud_keyword(&self, input: &str) -> bool {
        let lower = input.to_lowercase();
        self.fraud_keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Whether the input contains a greeting phrase
    pub fn contains_greeting(&self, input: &str) -> bool {
        let lower = input.to_lowercase();
        self.greetings
            .iter()
            .any(|g| lower.contains(&g.to_lowercase()))
    }

    /// Whether the input mentions a high-risk term
    pub fn contains_high_risk_term(&self, input: &str) -> bool {
        let lower = input.to_lowercase();
        self.high_risk_terms.iter().any(|t| lower.contains(t.as_str()))
    }

    /// Whether the input mentions a medium-risk term
    pub fn contains_medium_risk_term(&self, input: &str) -> bool {
        let lower = input.to_lowercase();
        self.medium_risk_terms.iter().any(|t| lower.contains(t.as_str()))
    }

    /// Count how many of the given markers appear in the input
    pub fn marker_hits(&self, input: &str, markers: &[String]) -> usize {
        markers.iter().filter(|m| input.contains(m.as_str())).count()
    }

    /// Infer a case category from free text (payload content or user input)
    pub fn infer_category(&self, text: &str) -> CaseCategory {
        if text.contains("거래") {
            CaseCategory::Transaction
        } else if text.contains("투자") {
            CaseCategory::Investment
        } else if text.contains("사칭") {
            CaseCategory::Impersonation
        } else {
            CaseCategory::Phishing
        }
    }
}
