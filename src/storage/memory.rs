//! 内存存储，测试替身

use super::{DestinationObject, DestinationStorage, Page, SourceFile, SourceStorage};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn source_file(path_display: &str, size: u64, modified_secs: i64) -> SourceFile {
    let name = path_display.rsplit('/').next().unwrap_or(path_display).to_string();
    SourceFile {
        path_lower: path_display.to_lowercase(),
        path_display: path_display.to_string(),
        id: format!("id:{}", path_display.to_lowercase()),
        name,
        size,
        client_modified: Some(Utc.timestamp_opt(modified_secs, 0).unwrap()),
        server_modified: Utc.timestamp_opt(modified_secs + 60, 0).unwrap(),
    }
}

/// 按页返回预设文件；游标形如 `page-N`
#[derive(Default)]
pub struct MemorySource {
    pages: Vec<Vec<SourceFile>>,
    contents: HashMap<String, Bytes>,
    failing_downloads: HashSet<String>,
    download_delays: HashMap<String, Duration>,
    failing_page: Option<usize>,
    pub page_requests: AtomicUsize,
}

impl MemorySource {
    /// 每页 `page_size` 个文件，内容为与 size 等长的字节
    pub fn new(files: Vec<SourceFile>, page_size: usize) -> Self {
        let contents = files
            .iter()
            .map(|f| (f.path_lower.clone(), Bytes::from(vec![b'x'; f.size as usize])))
            .collect();
        let pages = if files.is_empty() {
            vec![Vec::new()]
        } else {
            files.chunks(page_size.max(1)).map(|c| c.to_vec()).collect()
        };
        Self {
            pages,
            contents,
            ..Default::default()
        }
    }

    pub fn fail_download(mut self, path_lower: &str) -> Self {
        self.failing_downloads.insert(path_lower.to_string());
        self
    }

    /// 下载前等待，用于模拟慢速文件
    pub fn delay_download(mut self, path_lower: &str, delay: Duration) -> Self {
        self.download_delays.insert(path_lower.to_string(), delay);
        self
    }

    pub fn fail_page(mut self, index: usize) -> Self {
        self.failing_page = Some(index);
        self
    }
}

fn page_index(cursor: Option<&str>) -> Result<usize> {
    match cursor {
        None => Ok(0),
        Some(c) => c
            .strip_prefix("page-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow!("bad cursor {}", c)),
    }
}

fn next_cursor(index: usize, total: usize) -> Option<String> {
    (index + 1 < total).then(|| format!("page-{}", index + 1))
}

#[async_trait]
impl SourceStorage for MemorySource {
    async fn list_page(&self, _root: &str, cursor: Option<&str>) -> Result<Page<SourceFile>> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let index = page_index(cursor)?;
        if self.failing_page == Some(index) {
            bail!("HTTP 429: too_many_requests");
        }
        let entries = self.pages.get(index).cloned().unwrap_or_default();
        Ok(Page {
            entries,
            next: next_cursor(index, self.pages.len()),
        })
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        if let Some(delay) = self.download_delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_downloads.contains(path) {
            bail!("Dropbox download of {} failed: connection reset", path);
        }
        self.contents
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("path/not_found: {}", path))
    }

    fn name(&self) -> &str {
        "memory-source"
    }
}

/// 写入的对象
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub last_modified: DateTime<Utc>,
}

/// 按 key 有序分页的内存桶；写入时间取自可调时钟
pub struct MemoryDestination {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
    clock: Mutex<DateTime<Utc>>,
    failing_puts: HashSet<String>,
    fail_listing: bool,
    pub page_requests: AtomicUsize,
}

impl MemoryDestination {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            clock: Mutex::new(Utc::now()),
            failing_puts: HashSet::new(),
            fail_listing: false,
            page_requests: AtomicUsize::new(0),
        }
    }

    pub fn fail_put(mut self, key: &str) -> Self {
        self.failing_puts.insert(key.to_string());
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn set_clock(&self, now: DateTime<Utc>) {
        *self.clock.lock().unwrap() = now;
    }

    /// 预置一个对象
    pub fn insert(&self, key: &str, size: usize, last_modified: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: Bytes::from(vec![b'x'; size]),
                content_type: "application/octet-stream".to_string(),
                metadata: HashMap::new(),
                last_modified,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl DestinationStorage for MemoryDestination {
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<Page<DestinationObject>> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            bail!("ListObjectsV2 failed: AccessDenied");
        }

        let objects = self.objects.lock().unwrap();
        let matching: Vec<_> = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| DestinationObject {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: o.last_modified,
                etag: None,
            })
            .collect();

        let index = page_index(continuation_token)?;
        let pages: Vec<_> = matching.chunks(self.page_size).collect();
        let entries = pages.get(index).map(|p| p.to_vec()).unwrap_or_default();
        Ok(Page {
            entries,
            next: next_cursor(index, pages.len()),
        })
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        if self.failing_puts.contains(key) {
            bail!("PutObject {} failed: SlowDown", key);
        }
        let last_modified = *self.clock.lock().unwrap();
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
                last_modified,
            },
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "memory-destination"
    }
}
