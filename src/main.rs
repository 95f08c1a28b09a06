//! flowcraft command line.
//!
//! Usage:
//!   flowcraft plan "매주 매출 데이터를 정리해서 팀에 공유" --answer "도구=구글 시트"
//!   flowcraft score "카카오톡으로 자동 알림 보내기"
//!   flowcraft tools "인스타그램 게시물 예약" --priority cost
//!   flowcraft patterns --learned

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowcraft::clients::build_clients;
use flowcraft::config::Config;
use flowcraft::patterns::{JsonFileStore, PatternStore};
use flowcraft::pipeline::{PlanCoordinator, PlanRequest};
use flowcraft::registry::{Priority, detect_domain, get_optimal_ai_tools};

#[derive(Parser)]
#[command(name = "flowcraft")]
#[command(about = "Draft, verify and explain automation plans for repetitive tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the cards with request metrics
    Plan {
        /// Description of the repetitive task
        text: String,
        /// Follow-up answer as `question=answer` (repeatable)
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<(String, String)>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Ignore configured API keys and use deterministic fallbacks
        #[arg(long)]
        offline: bool,
        /// Do not record failure cases
        #[arg(long)]
        no_learn: bool,
        /// Print single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Print the feasibility report for a task
    Score {
        text: String,
        #[arg(long)]
        offline: bool,
    },
    /// Detect the task's domain and rank its tools
    Tools {
        text: String,
        #[arg(long, default_value = "ease")]
        priority: Priority,
        /// Include advanced tools
        #[arg(long)]
        advanced: bool,
    },
    /// List failure patterns (static and learned, or learned only)
    Patterns {
        #[arg(long)]
        learned: bool,
    },
}

fn parse_answer(raw: &str) -> std::result::Result<(String, String), String> {
    let (question, answer) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected question=answer, got '{raw}'"))?;
    let question = question.trim();
    if question.is_empty() {
        return Err("question must not be empty".to_string());
    }
    Ok((question.to_string(), answer.trim().to_string()))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{out}");
    Ok(())
}

fn coordinator(config: Arc<Config>, offline: bool) -> PlanCoordinator {
    let (llm, search) = build_clients(&config, offline);
    let store: Arc<dyn PatternStore> = Arc::new(JsonFileStore::new(config.store.resolve_dir()));
    PlanCoordinator::new(config, llm, search, store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // stdout carries JSON only
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.runtime.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(config);
    match cli.command {
        Commands::Plan {
            text,
            answers,
            priority,
            offline,
            no_learn,
            compact,
        } => {
            let mut coordinator = coordinator(config, offline);
            if no_learn {
                coordinator = coordinator.without_learning();
            }
            let request = PlanRequest {
                input: text,
                answers: answers.into_iter().collect::<BTreeMap<_, _>>(),
                priority,
            };
            let output = coordinator.plan(request).await;
            let learned = coordinator.flush_learning().await;
            if !learned.is_empty() {
                info!(outcomes = ?learned, "Failure learning finished");
            }
            print_json(&output, compact)
        }
        Commands::Score { text, offline } => {
            let coordinator = coordinator(config, offline);
            let report = coordinator.scorer().score(&text, &BTreeMap::new()).await;
            print_json(&report, false)
        }
        Commands::Tools {
            text,
            priority,
            advanced,
        } => {
            let detected = detect_domain(&text, "");
            let recommendation = get_optimal_ai_tools(detected.domain, priority, advanced);
            print_json(
                &serde_json::json!({
                    "domain": detected,
                    "recommendation": recommendation,
                }),
                false,
            )
        }
        Commands::Patterns { learned } => {
            let patterns = if learned {
                let store = JsonFileStore::new(config.store.resolve_dir());
                store
                    .load_patterns()
                    .await
                    .with_context(|| format!("reading patterns from {}", store.dir().display()))?
            } else {
                coordinator(config, true).matcher().all_patterns().await
            };
            print_json(&patterns, false)
        }
    }
}
