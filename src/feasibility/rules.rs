//! Versioned table of known platform restrictions
//!
//! A rule fires when the text names the platform AND an action the platform
//! does not allow to be automated. The same table drives the scorer, step
//! extraction in the verifier, and step rewriting.

use serde::{Deserialize, Serialize};

use crate::utils::{first_hit, normalize};

pub const RULES_VERSION: &str = "2025.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// A blocking restriction makes the request unrealistic regardless of score.
    pub fn is_blocking(&self) -> bool {
        *self == Severity::Critical
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionRule {
    pub id: &'static str,
    /// Lowercase platform spellings, longest first
    pub platforms: &'static [&'static str],
    pub actions: &'static [&'static str],
    /// The integration that is not possible
    pub integration: &'static str,
    pub reason: &'static str,
    pub alternatives: &'static [&'static str],
    /// Replacement phrase used when rewriting a step
    pub replacement: &'static str,
    pub severity: Severity,
}

pub const RULES: &[RestrictionRule] = &[
    RestrictionRule {
        id: "kakao_personal_messaging",
        platforms: &["카카오톡", "kakaotalk", "카카오", "kakao", "카톡"],
        actions: &[
            "보내", "전송", "발송", "알림", "메시지", "자동", "send", "message", "notify",
        ],
        integration: "카카오톡 개인 메시지 자동 발송",
        reason: "카카오톡은 개인 계정의 메시지 발송 API를 제공하지 않습니다 (알림톡은 사업자 인증과 발송 대행 계약이 필요)",
        alternatives: &["이메일 (Gmail)", "텔레그램 봇", "Slack 웹훅"],
        replacement: "텔레그램 봇",
        severity: Severity::Critical,
    },
    RestrictionRule {
        id: "instagram_dm_automation",
        platforms: &["인스타그램", "instagram", "인스타"],
        actions: &[
            "dm", "다이렉트", "팔로우", "좋아요", "follow", "like", "메시지",
        ],
        integration: "인스타그램 DM/팔로우 자동화",
        reason: "인스타그램 개인 계정의 DM·팔로우 자동화는 API가 없고 이용약관 위반으로 계정이 정지될 수 있습니다",
        alternatives: &["Meta Business Suite 예약 게시", "Buffer", "이메일 뉴스레터"],
        replacement: "Buffer",
        severity: Severity::High,
    },
    RestrictionRule {
        id: "naver_blog_posting",
        platforms: &["네이버 블로그", "naver blog", "네이버블로그"],
        actions: &["포스팅", "게시", "발행", "글쓰기", "업로드", "post", "publish"],
        integration: "네이버 블로그 자동 게시",
        reason: "네이버 블로그 글쓰기 API는 종료되어 외부 도구로 자동 게시할 수 없습니다",
        alternatives: &["티스토리/워드프레스 API", "Notion 초안 작성 후 수동 게시"],
        replacement: "워드프레스",
        severity: Severity::High,
    },
    RestrictionRule {
        id: "whatsapp_personal",
        platforms: &["whatsapp", "왓츠앱", "왓츠 앱"],
        actions: &["보내", "전송", "발송", "메시지", "자동", "send", "message"],
        integration: "WhatsApp 개인 계정 메시지 자동화",
        reason: "WhatsApp 개인 계정 자동화는 금지되며 Business API는 승인과 유료 요금제가 필요합니다",
        alternatives: &["텔레그램 봇", "Slack 웹훅", "이메일 (Gmail)"],
        replacement: "텔레그램 봇",
        severity: Severity::High,
    },
    RestrictionRule {
        id: "facebook_personal_profile",
        platforms: &["페이스북", "facebook"],
        actions: &[
            "개인 프로필", "타임라인", "친구", "자동 게시", "profile", "timeline", "friend",
        ],
        integration: "페이스북 개인 프로필 자동 게시",
        reason: "페이스북 개인 프로필 게시 API는 폐지되어 페이지 계정만 자동 게시가 가능합니다",
        alternatives: &["페이스북 페이지 + Meta Business Suite", "Buffer"],
        replacement: "Buffer",
        severity: Severity::High,
    },
    RestrictionRule {
        id: "personal_banking_automation",
        platforms: &["인터넷뱅킹", "은행", "계좌", "banking", "bank"],
        actions: &["이체", "송금", "로그인", "자동 조회", "transfer", "login"],
        integration: "은행 계좌 자동 로그인·이체",
        reason: "국내 은행은 보안 프로그램과 인증서로 자동 로그인·이체를 차단하며 스크래핑은 약관 위반입니다",
        alternatives: &["은행 자동이체 기능", "오픈뱅킹 기반 가계부 앱", "거래 알림 메일 연동"],
        replacement: "은행 자동이체 기능",
        severity: Severity::Critical,
    },
    RestrictionRule {
        id: "coupang_crawling",
        platforms: &["쿠팡", "coupang"],
        actions: &["크롤링", "스크래핑", "수집", "crawl", "scrap"],
        integration: "쿠팡 상품 페이지 크롤링",
        reason: "쿠팡은 봇 차단으로 크롤링을 막고 있으며 약관상 자동 수집이 금지됩니다",
        alternatives: &["쿠팡 파트너스 API", "가격 추적 서비스 알림"],
        replacement: "쿠팡 파트너스 API",
        severity: Severity::Medium,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMatch {
    pub rule: &'static RestrictionRule,
    /// Platform keyword as found
    pub platform: &'static str,
    pub action: &'static str,
}

impl RuleMatch {
    pub fn impossible_element(&self) -> String {
        format!("{}: {}", self.rule.integration, self.rule.reason)
    }
}

/// Every rule whose platform and action keywords both occur in `text`.
pub fn match_rules(text: &str) -> Vec<RuleMatch> {
    let text = normalize(text);
    RULES
        .iter()
        .filter_map(|rule| {
            let platform = first_hit(&text, rule.platforms)?;
            let action = first_hit(&text, rule.actions)?;
            Some(RuleMatch {
                rule,
                platform,
                action,
            })
        })
        .collect()
}

/// Rule whose platform is mentioned, regardless of action.
pub fn rule_for_platform(text: &str) -> Option<(&'static RestrictionRule, &'static str)> {
    let text = normalize(text);
    RULES
        .iter()
        .find_map(|rule| first_hit(&text, rule.platforms).map(|p| (rule, p)))
}

pub fn rule_by_id(id: &str) -> Option<&'static RestrictionRule> {
    RULES.iter().find(|r| r.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kakao_rule_fires_on_notification_request() {
        let matches = match_rules("카카오톡으로 자동 알림 보내기");
        assert_eq!(matches.len(), 1);
        let m = matches[0];
        assert_eq!(m.rule.id, "kakao_personal_messaging");
        assert_eq!(m.platform, "카카오톡");
        assert!(m.rule.severity.is_blocking());
        assert!(m.impossible_element().contains("API"));
    }

    #[test]
    fn platform_without_action_does_not_fire() {
        assert!(match_rules("쿠팡에서 산 물건 목록 정리").is_empty());
        assert!(match_rules("쿠팡 가격 크롤링").len() == 1);
    }

    #[test]
    fn platform_lookup_ignores_action() {
        let (rule, platform) = rule_for_platform("1. 카톡 메시지 확인").unwrap();
        assert_eq!(rule.id, "kakao_personal_messaging");
        assert_eq!(platform, "카톡");
        assert!(rule_for_platform("Slack 채널 생성").is_none());
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut ids: Vec<_> = RULES.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), RULES.len());
        assert!(rule_by_id("coupang_crawling").is_some());
    }
}
