//! 同步错误分类

use thiserror::Error;

/// 同步过程中的错误
///
/// `Configuration` 和 `Listing` 会终止整次运行；`Transfer` 只影响单个文件，
/// 由编排器记录后继续处理其余文件。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// 必需配置缺失或无效，不会发起任何请求
    #[error("{0}")]
    Configuration(String),

    /// 任一侧的分页列举失败
    #[error("Failed to list {side} files: {message}")]
    Listing { side: &'static str, message: String },

    /// 单个文件的下载或上传失败
    #[error("{message}")]
    Transfer { path: String, message: String },
}

impl SyncError {
    /// 根据缺失的环境变量构造配置错误
    pub fn missing_settings(keys: &[&str]) -> Self {
        match keys {
            [key] => SyncError::Configuration(format!("{} environment variable is required", key)),
            _ => SyncError::Configuration(format!(
                "Missing required environment variables: {}",
                keys.join(", ")
            )),
        }
    }

    pub(crate) fn listing(side: &'static str, err: &anyhow::Error) -> Self {
        SyncError::Listing {
            side,
            message: format!("{:#}", err),
        }
    }

    pub(crate) fn transfer(path: &str, err: &anyhow::Error) -> Self {
        SyncError::Transfer {
            path: path.to_string(),
            message: format!("{:#}", err),
        }
    }

    /// 是否为致命错误（整次运行失败）
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Transfer { .. })
    }
}
