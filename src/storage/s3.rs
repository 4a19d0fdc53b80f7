use super::{DestinationObject, DestinationStorage, Page, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::Object;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

pub struct S3Storage {
    client: Client,
    bucket: String,
    name: String,
}

impl S3Storage {
    /// 凭证来自 aws-config 默认链（环境变量、配置文件、实例角色等）
    pub async fn new(bucket: &str, region: &str, endpoint: Option<String>) -> Self {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
            .operation_timeout(Duration::from_secs(IO_TIMEOUT_SECS))
            .build();

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .timeout_config(timeouts)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref ep) = endpoint {
            // S3 兼容服务（MinIO、R2 等）通常需要 path-style
            builder = builder.endpoint_url(ep).force_path_style(true);
        }

        Self::from_client(Client::from_conf(builder.build()), bucket)
    }

    pub fn from_client(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            name: format!("s3://{}", bucket),
        }
    }
}

#[async_trait]
impl DestinationStorage for S3Storage {
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<Page<DestinationObject>> {
        let mut request = self.client.list_objects_v2().bucket(&self.bucket);
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let output = request.send().await.map_err(|e| {
            anyhow!(
                "ListObjectsV2 on {}/{} failed: {}",
                self.name,
                prefix,
                DisplayErrorContext(&e)
            )
        })?;

        let entries = output.contents().iter().filter_map(to_destination_object).collect();
        let next = output
            .next_continuation_token()
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Page { entries, next })
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type);

        for (k, v) in metadata {
            request = request.metadata(k, v);
        }

        request.send().await.map_err(|e| {
            anyhow!(
                "PutObject {}/{} failed: {}",
                self.name,
                key,
                DisplayErrorContext(&e)
            )
        })?;

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 没有 key 的条目直接丢弃
fn to_destination_object(object: &Object) -> Option<DestinationObject> {
    let key = object.key()?.to_string();
    let last_modified = object
        .last_modified()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_default();

    Some(DestinationObject {
        key,
        size: object.size().unwrap_or(0).max(0) as u64,
        last_modified,
        etag: object.e_tag().map(|s| s.trim_matches('"').to_string()),
    })
}
