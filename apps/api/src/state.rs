use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::schedule::crawl::CrawlSource;
use crate::schedule::structurer::ScheduleStructurer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Used directly for notice OCR; structuring goes through `structurer`.
    pub llm: LlmClient,
    pub config: Config,
    /// Pluggable structuring backend. Default: LlmStructurer. Swap via SCHEDULE_STRUCTURER.
    pub structurer: Arc<dyn ScheduleStructurer>,
    /// Official-site crawler with its Redis row cache.
    pub crawl: CrawlSource,
}
