// Exam-schedule reconciliation engine
// Implements: location normalization, official/internal extraction, grouping,
// reconciliation, read-time status, persistence and the HTTP surface.
// All LLM calls go through llm_client.

pub mod archive;
pub mod crawl;
pub mod demo;
pub mod error;
pub mod grouping;
pub mod handlers;
pub mod internal;
pub mod locations;
pub mod official;
pub mod parsing;
pub mod prompts;
pub mod reconcile;
pub mod rules;
pub mod status;
pub mod store;
pub mod structurer;
pub mod types;
