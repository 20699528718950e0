//! Text structuring — pluggable, trait-based backends that turn free text into
//! the `{ "schedules": [...] }` JSON contract consumed by the extractors.
//!
//! Default: `LlmStructurer` (prompted completion through `llm_client`).
//! Alternative: `RuleStructurer` (pure-Rust, deterministic, no network).
//!
//! `AppState` holds an `Arc<dyn ScheduleStructurer>`, chosen at startup via config.

use async_trait::async_trait;
use serde_json::Value;

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_GUESSING_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::schedule::error::ExtractionError;
use crate::schedule::prompts::{
    INTERNAL_STRUCTURE_PROMPT, INTERNAL_STRUCTURE_SYSTEM, OFFICIAL_STRUCTURE_PROMPT,
    OFFICIAL_STRUCTURE_SYSTEM,
};
use crate::schedule::rules;
use crate::schedule::types::ExamType;

/// Which record shape the structuring call must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    Official,
    Internal,
}

/// Caller-supplied context. The year is the only source of the year for
/// fragments like "11월 10일".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionHint {
    pub year: i32,
    pub exam_type: Option<ExamType>,
}

#[async_trait]
pub trait ScheduleStructurer: Send + Sync {
    async fn structure(
        &self,
        kind: StructureKind,
        text: &str,
        hint: &ExtractionHint,
    ) -> Result<Value, ExtractionError>;

    /// "llm" | "rules" — reported in logs for transparency.
    fn backend(&self) -> &'static str;
}

pub struct LlmStructurer(pub LlmClient);

#[async_trait]
impl ScheduleStructurer for LlmStructurer {
    async fn structure(
        &self,
        kind: StructureKind,
        text: &str,
        hint: &ExtractionHint,
    ) -> Result<Value, ExtractionError> {
        let (template, system) = match kind {
            StructureKind::Official => (OFFICIAL_STRUCTURE_PROMPT, OFFICIAL_STRUCTURE_SYSTEM),
            StructureKind::Internal => (INTERNAL_STRUCTURE_PROMPT, INTERNAL_STRUCTURE_SYSTEM),
        };
        let prompt = template
            .replace("{year}", &hint.year.to_string())
            .replace(
                "{exam_type}",
                hint.exam_type.map(|t| t.as_str()).unwrap_or("(infer from text)"),
            )
            .replace("{text}", text);
        let system = format!("{system}\n{JSON_ONLY_SYSTEM}\n{NO_GUESSING_INSTRUCTION}");

        Ok(self.0.call_json::<Value>(&prompt, &system).await?)
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

pub struct RuleStructurer;

#[async_trait]
impl ScheduleStructurer for RuleStructurer {
    async fn structure(
        &self,
        kind: StructureKind,
        text: &str,
        hint: &ExtractionHint,
    ) -> Result<Value, ExtractionError> {
        Ok(match kind {
            StructureKind::Official => rules::structure_official(text, hint),
            StructureKind::Internal => rules::structure_internal(text, hint),
        })
    }

    fn backend(&self) -> &'static str {
        "rules"
    }
}
