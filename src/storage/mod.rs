pub mod dropbox;
pub mod s3;

#[cfg(test)]
pub(crate) mod memory;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub use dropbox::DropboxStorage;
pub use s3::S3Storage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- 建立连接、列举等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- 下载、上传等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 源端（Dropbox）文件信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// 小写路径，用于下载
    pub path_lower: String,
    /// 保留大小写的展示路径
    pub path_display: String,
    /// 文件名（不含目录）
    pub name: String,
    /// Dropbox 文件 ID
    pub id: String,
    pub size: u64,
    /// 客户端声明的修改时间
    pub client_modified: Option<DateTime<Utc>>,
    /// 服务端观察到的修改时间
    pub server_modified: DateTime<Utc>,
}

impl SourceFile {
    /// 有效修改时间：优先使用客户端时间
    pub fn effective_modified(&self) -> DateTime<Utc> {
        self.client_modified.unwrap_or(self.server_modified)
    }
}

/// 目标端（S3）对象信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// 暂不参与比较
    pub etag: Option<String>,
}

/// 一页列举结果
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub entries: Vec<T>,
    /// 下一页游标，`None` 表示已列举完毕
    pub next: Option<String>,
}

/// 同步源：只读，可分页列举并下载
#[async_trait]
pub trait SourceStorage: Send + Sync {
    /// 列举一页文件（递归，仅文件）
    ///
    /// `cursor` 为 `None` 时从 `root` 开始第一页，否则继续上一页返回的游标。
    async fn list_page(&self, root: &str, cursor: Option<&str>) -> Result<Page<SourceFile>>;

    /// 下载整个文件
    async fn download(&self, path: &str) -> Result<Bytes>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 同步目标：可分页列举并写入对象
#[async_trait]
pub trait DestinationStorage: Send + Sync {
    /// 列举 `prefix` 下的一页对象
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<Page<DestinationObject>>;

    /// 写入整个对象（创建或覆盖）
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建源存储
pub fn create_source(settings: &crate::config::SyncSettings) -> Result<Arc<dyn SourceStorage>> {
    tracing::info!("初始化 Dropbox 存储: root={:?}", settings.dropbox_path);
    Ok(Arc::new(DropboxStorage::new(&settings.dropbox_token)?) as Arc<dyn SourceStorage>)
}

/// 根据配置创建目标存储
pub async fn create_destination(
    settings: &crate::config::SyncSettings,
) -> Result<Arc<dyn DestinationStorage>> {
    tracing::info!(
        "初始化S3存储: bucket={}, region={}",
        settings.s3_bucket,
        settings.aws_region
    );
    Ok(Arc::new(
        S3Storage::new(
            &settings.s3_bucket,
            &settings.aws_region,
            settings.s3_endpoint.clone(),
        )
        .await,
    ) as Arc<dyn DestinationStorage>)
}
