//! Web crawl source for the official exam-registration site. Fetches the
//! regional schedule table and returns it as untyped rows; all typing happens
//! in the official extractor.

use std::sync::LazyLock;
use std::time::Duration;

use redis::AsyncCommands;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::schedule::types::ExamType;

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").expect("Invalid row selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("Invalid cell selector"));

const CACHE_KEY_PREFIX: &str = "exam-crawl";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Crawl source URL is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Crawl source returned status {0}")]
    Status(u16),

    #[error("Crawl timed out after {0}s")]
    Timeout(u64),
}

/// One raw regional row as printed on the registration site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRow {
    pub region: String,
    pub exam_date: String,
    pub exam_time: Option<String>,
    pub registration_period: Option<String>,
}

#[derive(Clone)]
pub struct CrawlSource {
    client: Client,
    base_url: Option<String>,
    redis: redis::Client,
    cache_ttl_secs: u64,
    timeout_secs: u64,
}

impl CrawlSource {
    pub fn new(
        base_url: Option<String>,
        redis: redis::Client,
        cache_ttl_secs: u64,
        timeout_secs: u64,
    ) -> Result<Self, CrawlError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()?,
            base_url,
            redis,
            cache_ttl_secs,
            timeout_secs,
        })
    }

    /// Returns the regional rows for `(year, exam_type)`, served from Redis
    /// when a fresh copy exists. Cache failures are logged and bypassed.
    pub async fn fetch_rows(&self, year: i32, exam_type: ExamType) -> Result<Vec<CrawlRow>, CrawlError> {
        let key = cache_key(year, exam_type);
        if let Some(rows) = self.cached(&key).await {
            debug!("Crawl cache hit for {key}");
            return Ok(rows);
        }

        let base_url = self.base_url.as_deref().ok_or(CrawlError::NotConfigured)?;
        let request = self
            .client
            .get(base_url)
            .query(&[("year", year.to_string()), ("examType", exam_type.as_str().to_string())])
            .send();
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), request)
            .await
            .map_err(|_| CrawlError::Timeout(self.timeout_secs))??;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status(status.as_u16()));
        }
        let html = response.text().await?;
        let rows = parse_schedule_table(&html);
        info!("Crawled {} regional rows for {year} {exam_type}", rows.len());

        self.store(&key, &rows).await;
        Ok(rows)
    }

    async fn cached(&self, key: &str) -> Option<Vec<CrawlRow>> {
        let mut conn = match self.redis.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Redis unavailable, bypassing crawl cache: {e}");
                return None;
            }
        };
        let raw: Option<String> = conn.get(key).await.ok()?;
        serde_json::from_str(&raw?).ok()
    }

    async fn store(&self, key: &str, rows: &[CrawlRow]) {
        let Ok(payload) = serde_json::to_string(rows) else {
            return;
        };
        if let Err(e) = self.try_store(key, payload).await {
            warn!("Failed to cache crawl rows under {key}: {e}");
        }
    }

    async fn try_store(&self, key: &str, payload: String) -> redis::RedisResult<()> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.set_ex(key, payload, self.cache_ttl_secs).await
    }
}

fn cache_key(year: i32, exam_type: ExamType) -> String {
    format!("{CACHE_KEY_PREFIX}:{year}:{}", exam_type.as_str())
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses the regional table. Expected columns: region, exam date, and
/// optionally exam time and registration period. Header rows (no `td`) and
/// rows with fewer than two cells are skipped.
pub fn parse_schedule_table(html: &str) -> Vec<CrawlRow> {
    let document = Html::parse_document(html);
    document
        .select(&ROW_SELECTOR)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&CELL_SELECTOR).map(cell_text).collect();
            if cells.len() < 2 || cells[0].is_empty() || cells[1].is_empty() {
                return None;
            }
            let optional = |idx: usize| cells.get(idx).filter(|c| !c.is_empty()).cloned();
            Some(CrawlRow {
                region: cells[0].clone(),
                exam_date: cells[1].clone(),
                exam_time: optional(2),
                registration_period: optional(3),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        <html><body>
        <table>
          <tr><th>지역</th><th>시험일</th><th>시간</th><th>접수기간</th></tr>
          <tr><td>서울</td><td>2025-11-10</td><td>10:00~11:40</td><td>10월 1일 ~ 10월 5일</td></tr>
          <tr><td> 부산 </td><td>2025-11-10</td><td></td><td></td></tr>
          <tr><td>사천</td><td>2025-11-17</td></tr>
          <tr><td colspan="4">공지사항</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_schedule_table_rows() {
        let rows = parse_schedule_table(TABLE);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].region, "서울");
        assert_eq!(rows[0].exam_time.as_deref(), Some("10:00~11:40"));
        assert_eq!(rows[0].registration_period.as_deref(), Some("10월 1일 ~ 10월 5일"));
        assert_eq!(rows[1].region, "부산");
        assert_eq!(rows[1].exam_time, None);
        assert_eq!(rows[2].exam_date, "2025-11-17");
    }

    #[test]
    fn test_cache_key_is_namespaced() {
        assert_eq!(cache_key(2025, ExamType::NonLife), "exam-crawl:2025:손보");
    }

    #[tokio::test]
    async fn test_unconfigured_source_errors_after_cache_miss() {
        let redis = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let source = CrawlSource::new(None, redis, 60, 1).unwrap();
        let err = source.fetch_rows(2025, ExamType::Life).await.unwrap_err();
        assert!(matches!(err, CrawlError::NotConfigured));
    }
}
