//! Built-in failure patterns

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use super::types::{FailurePattern, PatternOrigin, Severity};

struct PatternSpec {
    id: &'static str,
    tools: &'static [&'static str],
    actions: &'static [&'static str],
    context: &'static [&'static str],
    intents: &'static [&'static str],
    reason: &'static str,
    alternatives: &'static [&'static str],
    severity: Severity,
    confidence: f32,
    examples: &'static [&'static str],
}

const SPECS: &[PatternSpec] = &[
    PatternSpec {
        id: "kakao_personal_api",
        tools: &["카카오톡", "카톡", "kakaotalk", "kakao"],
        actions: &["자동 전송", "자동 발송", "메시지 보내", "알림 보내", "전송", "발송"],
        context: &["개인 계정", "친구", "단톡방", "채팅방"],
        intents: &["알림", "공유", "리마인드", "안내"],
        reason: "카카오톡은 개인 계정 메시지 발송 API가 없어 자동 전송이 불가능합니다",
        alternatives: &["텔레그램 봇", "Slack 웹훅", "이메일 (Gmail)"],
        severity: Severity::Critical,
        confidence: 0.95,
        examples: &["카카오톡으로 매일 매출 알림 보내기", "단톡방에 자동으로 공지 올리기"],
    },
    PatternSpec {
        id: "instagram_dm_bot",
        tools: &["인스타그램", "instagram", "인스타"],
        actions: &["dm", "다이렉트", "팔로우", "좋아요", "자동 댓글"],
        context: &["개인 계정", "팔로워", "고객"],
        intents: &["마케팅", "홍보", "응대"],
        reason: "인스타그램 DM·팔로우 자동화는 공식 API가 없고 계정 정지 위험이 큽니다",
        alternatives: &["Meta Business Suite", "Buffer", "이메일 뉴스레터"],
        severity: Severity::High,
        confidence: 0.9,
        examples: &["인스타 팔로워에게 자동 DM 보내기"],
    },
    PatternSpec {
        id: "naver_blog_api",
        tools: &["네이버 블로그", "naver blog", "네이버블로그"],
        actions: &["자동 포스팅", "자동 게시", "글 발행", "업로드"],
        context: &["블로그", "포스팅"],
        intents: &["마케팅", "홍보", "콘텐츠"],
        reason: "네이버 블로그 글쓰기 API가 종료되어 자동 게시가 불가능합니다",
        alternatives: &["워드프레스 REST API", "티스토리", "Notion 초안 + 수동 게시"],
        severity: Severity::High,
        confidence: 0.85,
        examples: &["네이버 블로그에 매일 자동 포스팅"],
    },
    PatternSpec {
        id: "marketplace_scraping",
        tools: &["쿠팡", "coupang", "네이버 쇼핑", "11번가"],
        actions: &["크롤링", "스크래핑", "수집", "crawl", "scrap"],
        context: &["가격", "상품", "리뷰"],
        intents: &["모니터링", "비교", "분석"],
        reason: "대형 쇼핑몰은 봇 차단과 약관으로 크롤링을 막아 수집이 자주 깨집니다",
        alternatives: &["쿠팡 파트너스 API", "네이버 쇼핑 검색 API", "가격 추적 서비스 알림"],
        severity: Severity::Medium,
        confidence: 0.75,
        examples: &["쿠팡 최저가 매일 크롤링해서 엑셀 저장"],
    },
    PatternSpec {
        id: "bank_scraping",
        tools: &["은행", "인터넷뱅킹", "공인인증서", "bank"],
        actions: &["자동 로그인", "이체", "스크래핑", "자동 조회"],
        context: &["계좌", "거래내역", "잔액"],
        intents: &["가계부", "정산", "관리"],
        reason: "은행 보안 프로그램이 자동 로그인과 스크래핑을 차단합니다",
        alternatives: &["은행 자동이체", "오픈뱅킹 기반 가계부 앱", "거래 알림 메일 파싱"],
        severity: Severity::Critical,
        confidence: 0.9,
        examples: &["은행 거래내역 매일 자동 조회해서 가계부 작성"],
    },
    PatternSpec {
        id: "zapier_free_tier_realtime",
        tools: &["zapier", "재피어"],
        actions: &["실시간", "1분마다", "매분", "멀티스텝", "multi-step"],
        context: &["무료", "free"],
        intents: &["모니터링", "동기화"],
        reason: "Zapier 무료 플랜은 15분 주기 폴링과 단일 단계 Zap만 지원합니다",
        alternatives: &["Make 무료 플랜", "Google Apps Script 트리거", "n8n 셀프호스팅"],
        severity: Severity::Medium,
        confidence: 0.6,
        examples: &["zapier 무료로 실시간 재고 동기화"],
    },
    PatternSpec {
        id: "unreviewed_ai_replies",
        tools: &["chatgpt", "gpt", "챗gpt"],
        actions: &["자동 답장", "자동 발송", "검토 없이", "바로 전송"],
        context: &["고객", "외부", "거래처"],
        intents: &["응대", "답변", "문의"],
        reason: "검토 없는 AI 자동 답장은 잘못된 정보가 고객에게 그대로 전달될 위험이 있습니다",
        alternatives: &["AI 초안 생성 후 사람 검토", "FAQ 템플릿 자동 추천"],
        severity: Severity::Medium,
        confidence: 0.55,
        examples: &["고객 문의 메일에 chatgpt로 자동 답장"],
    },
    PatternSpec {
        id: "vba_macro_in_cloud",
        tools: &["엑셀 매크로", "vba", "매크로"],
        actions: &["자동 실행", "예약 실행", "서버에서"],
        context: &["클라우드", "웹", "원드라이브"],
        intents: &["보고서", "집계"],
        reason: "VBA 매크로는 웹 엑셀이나 클라우드에서 예약 실행되지 않습니다",
        alternatives: &["Google Apps Script 시간 트리거", "Office Scripts + Power Automate"],
        severity: Severity::Low,
        confidence: 0.5,
        examples: &["엑셀 매크로를 매일 아침 클라우드에서 자동 실행"],
    },
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

static STATIC_PATTERNS: Lazy<Vec<FailurePattern>> = Lazy::new(|| {
    let created_at = DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default();
    SPECS
        .iter()
        .map(|s| FailurePattern {
            id: s.id.to_string(),
            context: owned(s.context),
            actions: owned(s.actions),
            tools: owned(s.tools),
            intents: owned(s.intents),
            reason: s.reason.to_string(),
            alternatives: owned(s.alternatives),
            severity: s.severity,
            confidence: s.confidence,
            examples: owned(s.examples),
            origin: PatternOrigin::Static,
            created_at,
        })
        .collect()
});

pub fn static_patterns() -> &'static [FailurePattern] {
    &STATIC_PATTERNS
}
