//! 单文件传输：从 Dropbox 下载，写入 S3

use crate::core::content_type::content_type_for;
use crate::error::SyncError;
use crate::storage::{DestinationStorage, SourceFile, SourceStorage};
use anyhow::{Context, Result};
use chrono::SecondsFormat;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 元数据键
pub const META_DROPBOX_PATH: &str = "dropbox-path";
pub const META_DROPBOX_ID: &str = "dropbox-id";
pub const META_DROPBOX_MODIFIED: &str = "dropbox-modified";
pub const META_ORIGINAL_SIZE: &str = "original-size";

/// 传输执行器
///
/// 不做重试：失败的文件会在下一次运行时重新被判定为需要上传。
#[derive(Clone)]
pub struct TransferExecutor {
    source: Arc<dyn SourceStorage>,
    dest: Arc<dyn DestinationStorage>,
}

impl TransferExecutor {
    pub fn new(source: Arc<dyn SourceStorage>, dest: Arc<dyn DestinationStorage>) -> Self {
        Self { source, dest }
    }

    /// 下载整个文件并以单次 put 写入 `dest_key`，返回写入的字节数
    pub async fn transfer(&self, file: &SourceFile, dest_key: &str) -> Result<u64, SyncError> {
        self.copy(file, dest_key)
            .await
            .map_err(|e| SyncError::transfer(&file.path_display, &e))
    }

    async fn copy(&self, file: &SourceFile, dest_key: &str) -> Result<u64> {
        debug!(
            "复制: {} -> {}/{} ({}字节)",
            file.path_display,
            self.dest.name(),
            dest_key,
            file.size
        );

        let data = self
            .source
            .download(&file.path_lower)
            .await
            .with_context(|| format!("download {}", file.path_display))?;
        let bytes = data.len() as u64;
        debug!("  读取完成: {} 实际{}字节", file.path_display, bytes);

        let content_type = content_type_for(&file.name);
        self.dest
            .put_object(dest_key, data, content_type, &provenance_metadata(file))
            .await
            .with_context(|| format!("upload {}", dest_key))?;
        debug!("  写入完成: {} ({})", dest_key, content_type);

        Ok(bytes)
    }
}

/// 记录来源信息的对象元数据
pub fn provenance_metadata(file: &SourceFile) -> HashMap<String, String> {
    let modified = file
        .effective_modified()
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    HashMap::from([
        (META_DROPBOX_PATH.to_string(), header_safe(&file.path_display)),
        (META_DROPBOX_ID.to_string(), header_safe(&file.id)),
        (META_DROPBOX_MODIFIED.to_string(), modified),
        (META_ORIGINAL_SIZE.to_string(), file.size.to_string()),
    ])
}

/// S3 用户元数据通过 HTTP 头传输，非 ASCII 值做百分号编码
fn header_safe(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        urlencoding::encode(value).into_owned()
    }
}
