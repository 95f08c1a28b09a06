//! Turn a plain-language description of a repetitive task into automation
//! plan cards: a feasibility check, a drafted flow, per-method verification
//! against current web evidence, and step-by-step guides.

pub mod clients;
pub mod config;
pub mod deserializers;
pub mod error;
pub mod feasibility;
pub mod json_recovery;
pub mod patterns;
pub mod pipeline;
pub mod prompts;
pub mod rag;
pub mod registry;
pub mod utils;

pub use error::{FlowcraftError, Result};
pub use pipeline::{Card, PipelineOutput, PlanCoordinator, PlanRequest};

// Load .env (or the file named by FLOWCRAFT_ENV_FILE) into the process
// environment. Missing files are silently ignored.
pub fn load_env() {
    match std::env::var("FLOWCRAFT_ENV_FILE") {
        Ok(path) => {
            let _ = dotenvy::from_path(path);
        }
        Err(_) => {
            let _ = dotenvy::dotenv();
        }
    }
}
