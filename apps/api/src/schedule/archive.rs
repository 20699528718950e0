//! Archives uploaded notice images to S3 so extracted schedules can be traced
//! back to their source.

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::Datelike;
use tracing::{info, warn};
use uuid::Uuid;

use crate::schedule::status::kst_now;

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

pub fn notice_key(year: i32, id: Uuid, content_type: &str) -> String {
    format!("notices/{year}/{id}.{}", extension_for(content_type))
}

pub async fn archive_notice(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    image: Bytes,
    content_type: &str,
) -> Result<String> {
    let key = notice_key(kst_now().year(), Uuid::new_v4(), content_type);
    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(image))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

    info!("Archived notice image to s3://{bucket}/{key}");
    Ok(key)
}

/// Archival never fails the request; errors are logged and `None` returned.
pub async fn try_archive_notice(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    image: Bytes,
    content_type: &str,
) -> Option<String> {
    match archive_notice(s3, bucket, image, content_type).await {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("Notice archival skipped: {e}");
            None
        }
    }
}
