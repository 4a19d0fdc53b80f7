//! 应用配置模块
//!
//! 所有配置来自环境变量，在运行开始前一次性校验。

use crate::core::engine::SyncConfig;
use crate::error::SyncError;
use std::fmt;

pub const ENV_DROPBOX_TOKEN: &str = "DROPBOX_ACCESS_TOKEN";
pub const ENV_DROPBOX_PATH: &str = "DROPBOX_PATH";
pub const ENV_S3_BUCKET: &str = "S3_BUCKET";
pub const ENV_S3_PREFIX: &str = "S3_PREFIX";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_S3_ENDPOINT: &str = "S3_ENDPOINT";
pub const ENV_MAX_CONCURRENCY: &str = "SYNC_MAX_CONCURRENCY";

const MAX_CONCURRENCY_LIMIT: usize = 64;

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_concurrency() -> usize {
    4 // 默认并行数为4
}

/// 同步设置
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub dropbox_token: String,
    /// Dropbox 起始目录，空字符串表示账户根目录
    pub dropbox_path: String,
    pub s3_bucket: String,
    pub s3_prefix: Option<String>,
    pub aws_region: String,
    /// S3 兼容服务的自定义端点
    pub s3_endpoint: Option<String>,
    pub max_concurrency: usize,
}

impl SyncSettings {
    /// 从进程环境变量读取
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过查找函数读取配置，空字符串视为未设置
    ///
    /// 缺失的必需项会一起报告。只有令牌和桶名去除首尾空白，路径和前缀原样使用。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let trimmed = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let dropbox_token = trimmed(ENV_DROPBOX_TOKEN);
        let s3_bucket = trimmed(ENV_S3_BUCKET);

        let missing: Vec<&str> = [
            (ENV_DROPBOX_TOKEN, dropbox_token.is_none()),
            (ENV_S3_BUCKET, s3_bucket.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(dropbox_token), Some(s3_bucket)) = (dropbox_token, s3_bucket) else {
            return Err(SyncError::missing_settings(&missing));
        };

        let max_concurrency = match trimmed(ENV_MAX_CONCURRENCY) {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| {
                    SyncError::Configuration(format!(
                        "{} must be a positive integer, got {:?}",
                        ENV_MAX_CONCURRENCY, raw
                    ))
                })?
                .clamp(1, MAX_CONCURRENCY_LIMIT),
            None => default_max_concurrency(),
        };

        Ok(Self {
            dropbox_token,
            dropbox_path: get(ENV_DROPBOX_PATH).unwrap_or_default(),
            s3_bucket,
            s3_prefix: get(ENV_S3_PREFIX),
            aws_region: get(ENV_AWS_REGION).unwrap_or_else(default_region),
            s3_endpoint: get(ENV_S3_ENDPOINT),
            max_concurrency,
        })
    }

    /// 转换为引擎配置
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            source_root: self.dropbox_path.clone(),
            dest_prefix: self.s3_prefix.clone(),
            max_concurrent_transfers: self.max_concurrency,
        }
    }

    /// 一行摘要，用于日志（不含令牌）
    pub fn summary(&self) -> String {
        let source = if self.dropbox_path.is_empty() {
            "/"
        } else {
            self.dropbox_path.as_str()
        };
        let dest = match &self.s3_prefix {
            Some(prefix) => format!("s3://{}/{}", self.s3_bucket, prefix),
            None => format!("s3://{}", self.s3_bucket),
        };
        format!(
            "dropbox:{} -> {} (region={}, concurrency={})",
            source, dest, self.aws_region, self.max_concurrency
        )
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("dropbox_token", &"***")
            .field("dropbox_path", &self.dropbox_path)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_prefix", &self.s3_prefix)
            .field("aws_region", &self.aws_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}
