//! Static tool catalog and domain keyword tables

use super::{Difficulty, DomainProfile, Pricing, ToolEntry};

pub const TOOLS: &[ToolEntry] = &[
    ToolEntry {
        name: "Google Sheets",
        aliases: &["google sheets", "구글 시트", "구글시트", "스프레드시트"],
        capabilities: &["spreadsheet", "data", "storage"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 5,
    },
    ToolEntry {
        name: "Google Apps Script",
        aliases: &["apps script", "앱스 스크립트", "앱스스크립트"],
        capabilities: &["scripting", "trigger", "integration"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Intermediate,
        setup_minutes: 30,
    },
    ToolEntry {
        name: "Gmail",
        aliases: &["gmail", "지메일"],
        capabilities: &["email", "notification"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 5,
    },
    ToolEntry {
        name: "Slack",
        aliases: &["slack", "슬랙"],
        capabilities: &["notification", "chat", "webhook"],
        pricing: Pricing::Freemium,
        monthly_usd: 0.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 10,
    },
    ToolEntry {
        name: "Telegram Bot API",
        aliases: &["telegram", "텔레그램"],
        capabilities: &["notification", "chat", "bot"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Intermediate,
        setup_minutes: 20,
    },
    ToolEntry {
        name: "Discord",
        aliases: &["discord", "디스코드"],
        capabilities: &["notification", "chat", "webhook"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 10,
    },
    ToolEntry {
        name: "Zapier",
        aliases: &["zapier", "재피어"],
        capabilities: &["integration", "trigger", "workflow"],
        pricing: Pricing::Freemium,
        monthly_usd: 20.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 15,
    },
    ToolEntry {
        name: "Make",
        aliases: &["make.com", "integromat", "메이크"],
        capabilities: &["integration", "trigger", "workflow"],
        pricing: Pricing::Freemium,
        monthly_usd: 9.0,
        difficulty: Difficulty::Intermediate,
        setup_minutes: 20,
    },
    ToolEntry {
        name: "n8n",
        aliases: &["n8n"],
        capabilities: &["integration", "workflow", "self-hosted"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Advanced,
        setup_minutes: 60,
    },
    ToolEntry {
        name: "IFTTT",
        aliases: &["ifttt"],
        capabilities: &["integration", "trigger"],
        pricing: Pricing::Freemium,
        monthly_usd: 3.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 10,
    },
    ToolEntry {
        name: "Notion",
        aliases: &["notion", "노션"],
        capabilities: &["docs", "database", "storage"],
        pricing: Pricing::Freemium,
        monthly_usd: 10.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 10,
    },
    ToolEntry {
        name: "Airtable",
        aliases: &["airtable", "에어테이블"],
        capabilities: &["database", "storage", "data"],
        pricing: Pricing::Freemium,
        monthly_usd: 20.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 15,
    },
    ToolEntry {
        name: "ChatGPT",
        aliases: &["chatgpt", "챗gpt", "챗지피티", "gpt"],
        capabilities: &["ai", "summarize", "writing"],
        pricing: Pricing::Freemium,
        monthly_usd: 20.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 5,
    },
    ToolEntry {
        name: "Looker Studio",
        aliases: &["looker studio", "루커 스튜디오", "data studio"],
        capabilities: &["dashboard", "visualization", "data"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Intermediate,
        setup_minutes: 30,
    },
    ToolEntry {
        name: "Python",
        aliases: &["python", "파이썬"],
        capabilities: &["scripting", "data", "scraping"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Advanced,
        setup_minutes: 120,
    },
    ToolEntry {
        name: "Tableau",
        aliases: &["tableau", "태블로"],
        capabilities: &["dashboard", "visualization", "data"],
        pricing: Pricing::Paid,
        monthly_usd: 75.0,
        difficulty: Difficulty::Advanced,
        setup_minutes: 180,
    },
    ToolEntry {
        name: "Apify",
        aliases: &["apify", "아피파이"],
        capabilities: &["scraping", "collection"],
        pricing: Pricing::Freemium,
        monthly_usd: 49.0,
        difficulty: Difficulty::Intermediate,
        setup_minutes: 30,
    },
    ToolEntry {
        name: "UptimeRobot",
        aliases: &["uptimerobot", "uptime robot"],
        capabilities: &["monitoring", "notification"],
        pricing: Pricing::Freemium,
        monthly_usd: 7.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 10,
    },
    ToolEntry {
        name: "Buffer",
        aliases: &["buffer", "버퍼"],
        capabilities: &["social", "scheduling", "publishing"],
        pricing: Pricing::Freemium,
        monthly_usd: 6.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 15,
    },
    ToolEntry {
        name: "Canva",
        aliases: &["canva", "캔바"],
        capabilities: &["design", "content"],
        pricing: Pricing::Freemium,
        monthly_usd: 13.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 10,
    },
    ToolEntry {
        name: "Google Calendar",
        aliases: &["google calendar", "구글 캘린더", "구글캘린더"],
        capabilities: &["calendar", "scheduling"],
        pricing: Pricing::Free,
        monthly_usd: 0.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 5,
    },
    ToolEntry {
        name: "Calendly",
        aliases: &["calendly", "캘린들리"],
        capabilities: &["scheduling", "booking"],
        pricing: Pricing::Freemium,
        monthly_usd: 10.0,
        difficulty: Difficulty::Beginner,
        setup_minutes: 10,
    },
    ToolEntry {
        name: "HubSpot",
        aliases: &["hubspot", "허브스팟"],
        capabilities: &["crm", "email", "marketing"],
        pricing: Pricing::Paid,
        monthly_usd: 50.0,
        difficulty: Difficulty::Intermediate,
        setup_minutes: 60,
    },
];

pub const GENERAL_AUTOMATION: DomainProfile = DomainProfile {
    id: "general_automation",
    label: "업무 자동화",
    keywords: &[],
    tools: &["Zapier", "Make", "Google Sheets", "Gmail", "IFTTT", "n8n"],
};

/// Ordered: earlier profiles win score ties.
pub const DOMAINS: &[DomainProfile] = &[
    DomainProfile {
        id: "data_analysis",
        label: "데이터 분석",
        keywords: &[
            ("분석", 3),
            ("데이터", 3),
            ("리포트", 2),
            ("보고서", 2),
            ("엑셀", 2),
            ("통계", 2),
            ("대시보드", 2),
            ("매출", 1),
            ("analysis", 3),
            ("analytics", 3),
            ("data", 3),
            ("report", 2),
            ("excel", 2),
            ("dashboard", 2),
            ("spreadsheet", 2),
            ("kpi", 2),
        ],
        tools: &[
            "Google Sheets",
            "Looker Studio",
            "Google Apps Script",
            "ChatGPT",
            "Python",
            "Tableau",
        ],
    },
    DomainProfile {
        id: "monitoring_alerts",
        label: "모니터링·알림",
        keywords: &[
            ("알림", 3),
            ("모니터링", 3),
            ("감시", 2),
            ("경고", 2),
            ("가격 변동", 2),
            ("재고", 1),
            ("alert", 3),
            ("monitor", 3),
            ("notify", 2),
            ("notification", 2),
            ("uptime", 2),
        ],
        tools: &[
            "Slack",
            "Telegram Bot API",
            "Gmail",
            "UptimeRobot",
            "Google Apps Script",
            "Zapier",
        ],
    },
    DomainProfile {
        id: "content_marketing",
        label: "콘텐츠·마케팅",
        keywords: &[
            ("콘텐츠", 3),
            ("마케팅", 3),
            ("sns", 3),
            ("블로그", 2),
            ("인스타그램", 2),
            ("게시", 2),
            ("포스팅", 2),
            ("뉴스레터", 2),
            ("content", 3),
            ("marketing", 3),
            ("social", 2),
            ("post", 2),
            ("blog", 2),
        ],
        tools: &["Buffer", "Canva", "ChatGPT", "Notion", "Zapier"],
    },
    DomainProfile {
        id: "email_communication",
        label: "이메일·커뮤니케이션",
        keywords: &[
            ("이메일", 3),
            ("메일", 3),
            ("답장", 2),
            ("고객 문의", 2),
            ("email", 3),
            ("inbox", 2),
            ("reply", 2),
        ],
        tools: &["Gmail", "Zapier", "ChatGPT", "Make", "HubSpot"],
    },
    DomainProfile {
        id: "scheduling",
        label: "일정 관리",
        keywords: &[
            ("일정", 3),
            ("예약", 3),
            ("캘린더", 3),
            ("회의", 2),
            ("미팅", 2),
            ("schedule", 3),
            ("calendar", 3),
            ("meeting", 2),
            ("booking", 2),
        ],
        tools: &["Google Calendar", "Calendly", "Zapier", "Slack"],
    },
    DomainProfile {
        id: "web_collection",
        label: "웹 정보 수집",
        keywords: &[
            ("크롤링", 3),
            ("스크래핑", 3),
            ("수집", 2),
            ("가격 비교", 2),
            ("crawl", 3),
            ("scrap", 3),
            ("collect", 2),
        ],
        tools: &["Apify", "Google Sheets", "Make", "Python"],
    },
    DomainProfile {
        id: "document_processing",
        label: "문서 처리",
        keywords: &[
            ("문서", 3),
            ("pdf", 3),
            ("계약서", 2),
            ("요약", 2),
            ("영수증", 2),
            ("정리", 1),
            ("document", 3),
            ("summarize", 2),
            ("invoice", 2),
        ],
        tools: &[
            "ChatGPT",
            "Google Apps Script",
            "Notion",
            "Airtable",
            "Make",
        ],
    },
];
