//! 调用入口：执行一次同步并生成 `{statusCode, body}` 结果

use crate::config::SyncSettings;
use crate::core::engine::{SyncEngine, SyncReport};
use crate::error::SyncError;
use lambda_runtime::LambdaEvent;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

pub const SUCCESS_MESSAGE: &str = "Sync completed successfully";
pub const FAILURE_MESSAGE: &str = "Sync failed";

/// 调用结果，`body` 为 JSON 字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// 执行一次完整同步；事件内容不参与处理
pub async fn handle(event: Value) -> HandlerResponse {
    handle_with(event, |key| std::env::var(key).ok()).await
}

/// 与 `handle` 相同，配置从 `lookup` 读取
pub async fn handle_with<F>(_event: Value, lookup: F) -> HandlerResponse
where
    F: Fn(&str) -> Option<String>,
{
    respond(run(lookup).await)
}

/// Lambda 运行时入口，事件载荷原样交给 `handle`
pub async fn lambda_handler(
    event: LambdaEvent<Value>,
) -> Result<HandlerResponse, lambda_runtime::Error> {
    let LambdaEvent { payload, context } = event;
    info!("收到调用: request_id={}", context.request_id);
    Ok(handle(payload).await)
}

async fn run<F>(lookup: F) -> Result<SyncReport, SyncError>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = SyncSettings::from_lookup(lookup)?;
    info!("同步配置: {}", settings.summary());

    let engine = SyncEngine::from_settings(&settings).await?;
    engine.run_sync().await
}

/// 把运行结果转换为调用结果
pub fn respond(result: Result<SyncReport, SyncError>) -> HandlerResponse {
    match result {
        Ok(report) => {
            info!(
                "运行 {} 完成，用时 {} 秒，传输 {} 字节",
                report.runId, report.duration, report.bytesTransferred
            );
            HandlerResponse {
                status_code: 200,
                body: json!({
                    "message": SUCCESS_MESSAGE,
                    "results": report.results,
                })
                .to_string(),
            }
        }
        Err(e) => {
            error!("同步失败: {}", e);
            HandlerResponse {
                status_code: 500,
                body: json!({
                    "message": FAILURE_MESSAGE,
                    "error": e.to_string(),
                })
                .to_string(),
            }
        }
    }
}
