//! Tool/action candidates pulled out of a flow step
//!
//! Tiers run in order and each contributes at most one candidate (first match
//! wins within a tier). The generic-action tier only applies when no tool tier
//! matched.

use serde::Serialize;

use super::rewrite::step_body;
use crate::feasibility::RULES;
use crate::registry::tools_in_text;
use crate::utils::{first_hit, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Crawling = 1,
    RestrictedPlatform = 2,
    Notification = 3,
    KnownTool = 4,
    WebhookApi = 5,
    GenericAction = 6,
}

impl Tier {
    /// Generic actions name no tool and are never looked up.
    pub fn needs_validation(&self) -> bool {
        *self != Tier::GenericAction
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub tool: String,
    pub action: String,
    pub tier: Tier,
}

impl Candidate {
    /// Memo key for per-request validation reuse
    pub fn key(&self) -> (String, String) {
        (normalize(&self.tool), normalize(&self.action))
    }
}

pub(crate) const CRAWL_WORDS: &[&str] = &["크롤링", "스크래핑", "crawl", "scrap", "긁어"];

/// (keyword, channel name)
const NOTIFICATION_CHANNELS: &[(&str, &str)] = &[
    ("slack", "Slack"),
    ("슬랙", "Slack"),
    ("telegram", "Telegram"),
    ("텔레그램", "Telegram"),
    ("discord", "Discord"),
    ("디스코드", "Discord"),
    ("gmail", "Gmail"),
    ("이메일", "이메일"),
    ("메일", "이메일"),
    ("문자", "SMS"),
    ("sms", "SMS"),
    ("푸시", "푸시 알림"),
];

const WEBHOOK_WORDS: &[&str] = &["웹훅", "webhook", "api", "rest"];

/// Generic verbs in the order they are preferred as the action of a step
const ACTIONS: &[&str] = &[
    "크롤링", "스크래핑", "수집", "전송", "발송", "보내", "알림", "게시", "업로드", "저장",
    "기록", "정리", "요약", "분석", "생성", "작성", "변환", "확인", "연결",
];

fn push(tool: String, action: String, tier: Tier, out: &mut Vec<Candidate>) {
    if !out.iter().any(|c| normalize(&c.tool) == normalize(&tool)) {
        out.push(Candidate { tool, action, tier });
    }
}

fn action_in(text: &str) -> String {
    first_hit(text, ACTIONS).unwrap_or("자동화").to_string()
}

/// Extract candidates from one step, ordered by tier.
pub fn extract_candidates(step: &str) -> Vec<Candidate> {
    let text = normalize(step_body(step));
    let action = action_in(&text);
    let mut out: Vec<Candidate> = Vec::new();

    // 1. crawling/scraping of a site
    if let Some(verb) = first_hit(&text, CRAWL_WORDS) {
        let site = RULES
            .iter()
            .find_map(|r| first_hit(&text, r.platforms))
            .map(str::to_string)
            .or_else(|| tools_in_text(&text).first().map(|t| t.name.to_string()))
            .unwrap_or_else(|| "웹사이트".to_string());
        push(site, verb.to_string(), Tier::Crawling, &mut out);
    }

    // 2. restricted consumer platforms
    if let Some((rule, platform)) = RULES
        .iter()
        .find_map(|r| first_hit(&text, r.platforms).map(|p| (r, p)))
    {
        let verb = first_hit(&text, rule.actions)
            .map(str::to_string)
            .unwrap_or_else(|| action.clone());
        push(platform.to_string(), verb, Tier::RestrictedPlatform, &mut out);
    }

    // 3. notification channels
    if let Some((_, channel)) = NOTIFICATION_CHANNELS
        .iter()
        .find(|(kw, _)| text.contains(kw))
    {
        push(channel.to_string(), "알림 전송".to_string(), Tier::Notification, &mut out);
    }

    // 4. known-good registry tools
    if let Some(tool) = tools_in_text(&text).into_iter().next() {
        push(tool.name.to_string(), action.clone(), Tier::KnownTool, &mut out);
    }

    // 5. webhook/api
    if let Some(word) = first_hit(&text, WEBHOOK_WORDS) {
        // The tool keeps the spelling found in the step so a rewrite can locate it
        let tool = match word {
            "api" => "API",
            "rest" => "REST",
            other => other,
        };
        push(tool.to_string(), "연동".to_string(), Tier::WebhookApi, &mut out);
    }

    // 6. generic action, only for tool-less steps
    if out.is_empty() && first_hit(&text, ACTIONS).is_some() {
        out.push(Candidate {
            tool: String::new(),
            action,
            tier: Tier::GenericAction,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kakao_step_yields_restricted_platform() {
        let c = extract_candidates("1. 카카오톡 메시지 자동 전송");
        assert_eq!(c[0].tier, Tier::RestrictedPlatform);
        assert_eq!(c[0].tool, "카카오톡");
        assert_eq!(c[0].action, "전송");
    }

    #[test]
    fn crawling_comes_first() {
        let c = extract_candidates("2. 쿠팡 상품 가격을 크롤링해서 구글 시트에 저장");
        assert_eq!(c[0].tier, Tier::Crawling);
        assert_eq!(c[0].tool, "쿠팡");
        // Same platform is not repeated by the restricted-platform tier
        assert!(c.iter().all(|x| x.tier != Tier::RestrictedPlatform));
        assert!(c.iter().any(|x| x.tier == Tier::KnownTool && x.tool == "Google Sheets"));
    }

    #[test]
    fn generic_action_only_without_tools() {
        let c = extract_candidates("3. 결과를 정리하기");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].tier, Tier::GenericAction);
        assert!(!c[0].tier.needs_validation());

        let c = extract_candidates("3. Slack으로 결과 정리 공유");
        assert!(c.iter().all(|x| x.tier != Tier::GenericAction));
    }

    #[test]
    fn webhook_tier() {
        let c = extract_candidates("4. 웹훅으로 주문 데이터 받기");
        assert!(c.iter().any(|x| x.tier == Tier::WebhookApi && x.tool == "웹훅"));

        let c = extract_candidates("4. REST 엔드포인트로 주문 조회");
        assert!(c.iter().any(|x| x.tier == Tier::WebhookApi && x.tool == "REST"));
    }

    #[test]
    fn crawl_without_named_site() {
        let c = extract_candidates("1. 경쟁사 웹 페이지 가격을 크롤링");
        assert_eq!(c[0].tier, Tier::Crawling);
        assert_eq!(c[0].tool, "웹사이트");
        assert_eq!(c[0].action, "크롤링");
    }

    #[test]
    fn nothing_recognisable() {
        assert!(extract_candidates("마무리").is_empty());
    }
}
