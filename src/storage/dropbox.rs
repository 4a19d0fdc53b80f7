use super::{Page, SourceFile, SourceStorage, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.dropboxapi.com";
const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com";

/// Dropbox HTTP API v2 客户端
pub struct DropboxStorage {
    client: Client,
    token: String,
    api_url: String,
    content_url: String,
    name: String,
}

/// list_folder / list_folder/continue 的响应
#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<Entry>,
    cursor: String,
    has_more: bool,
}

/// 条目按 `.tag` 区分，目录和已删除条目统一忽略
#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
enum Entry {
    File(FileEntry),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    name: String,
    id: String,
    path_lower: Option<String>,
    path_display: Option<String>,
    size: u64,
    client_modified: Option<DateTime<Utc>>,
    server_modified: DateTime<Utc>,
}

impl From<FileEntry> for SourceFile {
    fn from(entry: FileEntry) -> Self {
        // 未挂载的共享文件可能没有路径，Dropbox 也接受 "id:..." 作为路径
        let path_lower = entry.path_lower.unwrap_or_else(|| entry.id.clone());
        let path_display = entry.path_display.unwrap_or_else(|| path_lower.clone());
        SourceFile {
            path_lower,
            path_display,
            name: entry.name,
            id: entry.id,
            size: entry.size,
            client_modified: entry.client_modified,
            server_modified: entry.server_modified,
        }
    }
}

impl DropboxStorage {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_urls(token, DEFAULT_API_URL, DEFAULT_CONTENT_URL)
    }

    /// 指定 API 地址（用于测试或代理）
    pub fn with_base_urls(token: &str, api_url: &str, content_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
            .timeout(Duration::from_secs(IO_TIMEOUT_SECS))
            .build()
            .context("Failed to build Dropbox HTTP client")?;

        Ok(Self {
            client,
            token: token.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            content_url: content_url.trim_end_matches('/').to_string(),
            name: "dropbox://".to_string(),
        })
    }

    async fn list_folder(&self, root: &str) -> Result<ListFolderResult> {
        let body = json!({
            "path": normalize_root(root),
            "recursive": true,
            "include_deleted": false,
        });
        self.rpc("files/list_folder", &body).await
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResult> {
        self.rpc("files/list_folder/continue", &json!({ "cursor": cursor }))
            .await
    }

    async fn rpc(&self, endpoint: &str, body: &serde_json::Value) -> Result<ListFolderResult> {
        let response = self
            .client
            .post(format!("{}/2/{}", self.api_url, endpoint))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Dropbox {} request failed", endpoint))?;

        let response = check_status(endpoint, response).await?;
        response
            .json::<ListFolderResult>()
            .await
            .with_context(|| format!("Invalid Dropbox {} response", endpoint))
    }
}

#[async_trait]
impl SourceStorage for DropboxStorage {
    async fn list_page(&self, root: &str, cursor: Option<&str>) -> Result<Page<SourceFile>> {
        let result = match cursor {
            None => self.list_folder(root).await?,
            Some(cursor) => self.list_folder_continue(cursor).await?,
        };

        let next = if result.has_more {
            if result.cursor.is_empty() {
                bail!("Dropbox reported has_more without a cursor");
            }
            Some(result.cursor)
        } else {
            None
        };

        let entries = result
            .entries
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::File(file) => Some(SourceFile::from(file)),
                Entry::Other => None,
            })
            .collect();

        Ok(Page { entries, next })
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let arg = header_safe_json(&json!({ "path": path }).to_string());
        let response = self
            .client
            .post(format!("{}/2/files/download", self.content_url))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await
            .with_context(|| format!("Dropbox download of {} failed", path))?;

        let response = check_status("files/download", response).await?;
        response
            .bytes()
            .await
            .with_context(|| format!("Failed to read Dropbox content of {}", path))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 账户根目录在 API 中必须写作空字符串
fn normalize_root(root: &str) -> &str {
    let trimmed = root.trim();
    if trimmed == "/" {
        ""
    } else {
        trimmed
    }
}

/// 非 2xx 响应转为错误，优先取 `error_summary`
async fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let summary = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("error_summary")?.as_str().map(str::to_string))
        .unwrap_or(text);

    Err(anyhow!(
        "Dropbox {} returned HTTP {}: {}",
        endpoint,
        status.as_u16(),
        summary.trim()
    ))
}

/// `Dropbox-API-Arg` 头只能是 ASCII，非 ASCII 字符需转义为 `\uXXXX`
fn header_safe_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}
