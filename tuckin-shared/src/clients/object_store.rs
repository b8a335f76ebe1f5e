use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client as S3Client;

use crate::{AppError, AppResult};

/// S3-compatible bucket client (Cloudflare R2 in production, MinIO locally).
#[derive(Clone)]
pub struct ObjectStoreClient {
    client: S3Client,
    bucket: String,
}

impl ObjectStoreClient {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str, bucket: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "tuckin");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        tracing::info!(endpoint = %endpoint, bucket = %bucket, "object store client initialized");

        Self {
            client: S3Client::from_conf(config),
            bucket: bucket.to_string(),
        }
    }

    /// Delete every object whose key starts with `prefix`. Returns the number
    /// of objects removed.
    pub async fn delete_prefix(&self, prefix: &str) -> AppResult<usize> {
        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| AppError::transient(format!("list failed: {e}")))?;

            let ids = page
                .contents()
                .iter()
                .filter_map(|object| object.key())
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::internal(format!("invalid object key: {e}")))?;

            if !ids.is_empty() {
                let count = ids.len();
                let delete = Delete::builder()
                    .set_objects(Some(ids))
                    .quiet(true)
                    .build()
                    .map_err(|e| AppError::internal(format!("delete request error: {e}")))?;

                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| AppError::transient(format!("delete failed: {e}")))?;
                deleted += count;
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(prefix = %prefix, deleted, "object prefix deleted");
        Ok(deleted)
    }
}
