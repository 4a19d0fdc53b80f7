use crate::storage::{DestinationObject, SourceFile};
use std::collections::HashMap;
use std::fmt;

/// 需要上传的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadReason {
    /// 目标中不存在
    New,
    /// 大小不同
    SizeChanged,
    /// 源文件更新
    SourceNewer,
}

impl fmt::Display for UploadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadReason::New => write!(f, "new"),
            UploadReason::SizeChanged => write!(f, "size_changed"),
            UploadReason::SourceNewer => write!(f, "source_newer"),
        }
    }
}

/// 同步决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Upload(UploadReason),
    Skip,
}

impl SyncDecision {
    pub fn is_upload(&self) -> bool {
        matches!(self, SyncDecision::Upload(_))
    }
}

/// 计算目标对象 key
///
/// 只使用文件名，源路径中的目录层级会被展平：
/// `/Vacation/2021/img.jpg` + `photos` => `photos/img.jpg`。
/// 前缀原样拼接，中间固定一个 `/`。
pub fn destination_key(prefix: Option<&str>, file_name: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}/{}", p, file_name),
        _ => file_name.to_string(),
    }
}

/// 文件比较器
///
/// 仅比较大小和修改时间，不比较内容哈希。同一时钟刻度内、大小不变的修改
/// 会被判定为跳过。
#[derive(Debug, Clone, Copy, Default)]
pub struct FileComparator;

impl FileComparator {
    pub fn new() -> Self {
        Self
    }

    /// 判断单个源文件是否需要上传，按顺序命中即返回
    pub fn decide(
        &self,
        source: &SourceFile,
        dest_key: &str,
        dest_tree: &HashMap<String, DestinationObject>,
    ) -> SyncDecision {
        let Some(dest) = dest_tree.get(dest_key) else {
            return SyncDecision::Upload(UploadReason::New);
        };

        // 大小不同，肯定不同
        if source.size != dest.size {
            tracing::debug!(
                "文件大小不同: {} (src={}, dst={})",
                source.path_display,
                source.size,
                dest.size
            );
            return SyncDecision::Upload(UploadReason::SizeChanged);
        }

        let source_modified = source.effective_modified();
        if source_modified > dest.last_modified {
            tracing::debug!(
                "源文件较新: {} (src_time={}, dst_time={})",
                source.path_display,
                source_modified,
                dest.last_modified
            );
            return SyncDecision::Upload(UploadReason::SourceNewer);
        }

        SyncDecision::Skip
    }
}
