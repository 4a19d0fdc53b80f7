#![allow(non_snake_case)]

use crate::config::SyncSettings;
use crate::core::comparator::{destination_key, FileComparator, SyncDecision};
use crate::core::scanner::{scan_destination, scan_source};
use crate::core::transfer::TransferExecutor;
use crate::error::SyncError;
use crate::storage::{self, DestinationObject, DestinationStorage, SourceFile, SourceStorage};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Dropbox 中的起始目录，空字符串表示账户根目录
    pub source_root: String,
    /// 目标 key 前缀
    pub dest_prefix: Option<String>,
    /// 最大并发传输数
    pub max_concurrent_transfers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_root: String::new(),
            dest_prefix: None,
            max_concurrent_transfers: 4, // 默认并行数为4
        }
    }
}

/// 已上传条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedEntry {
    pub dropboxPath: String,
    pub s3Key: String,
    pub size: u64,
}

/// 失败条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub file: String,
    pub error: String,
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded(UploadedEntry),
    Skipped(String),
    Failed(ErrorEntry),
}

/// 一次运行的结果汇总
///
/// 每个源文件恰好落入其中一类。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub uploaded: Vec<UploadedEntry>,
    pub skipped: Vec<String>,
    pub errors: Vec<ErrorEntry>,
}

impl SyncOutcome {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Uploaded(entry) => self.uploaded.push(entry),
            FileOutcome::Skipped(path) => self.skipped.push(path),
            FileOutcome::Failed(entry) => self.errors.push(entry),
        }
    }

    pub fn total_files(&self) -> usize {
        self.uploaded.len() + self.skipped.len() + self.errors.len()
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.uploaded.iter().map(|e| e.size).sum()
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub runId: String,
    pub startTime: i64,
    pub endTime: i64,
    pub duration: u64,
    pub sourceFiles: u64,
    pub destinationObjects: u64,
    pub bytesTransferred: u64,
    pub results: SyncOutcome,
}

/// 同步引擎
pub struct SyncEngine {
    source: Arc<dyn SourceStorage>,
    dest: Arc<dyn DestinationStorage>,
    config: SyncConfig,
    comparator: FileComparator,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn SourceStorage>,
        dest: Arc<dyn DestinationStorage>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            dest,
            config,
            comparator: FileComparator::new(),
        }
    }

    /// 根据已校验的配置创建存储连接
    pub async fn from_settings(settings: &SyncSettings) -> Result<Self, SyncError> {
        let source = storage::create_source(settings).map_err(|e| {
            error!("创建源存储失败: {:#}", e);
            SyncError::Configuration(format!("{:#}", e))
        })?;
        let dest = storage::create_destination(settings).await.map_err(|e| {
            error!("创建目标存储失败: {:#}", e);
            SyncError::Configuration(format!("{:#}", e))
        })?;
        Ok(Self::new(source, dest, settings.sync_config()))
    }

    /// 运行同步任务
    pub async fn run_sync(&self) -> Result<SyncReport, SyncError> {
        let start_time = chrono::Utc::now().timestamp();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "开始同步任务: {} -> {} ({})",
            self.source.name(),
            self.dest.name(),
            run_id
        );

        let (source_files, dest_tree) = self.enumerate().await?;
        let source_count = source_files.len();
        let dest_count = dest_tree.len();

        let results = self.process(source_files, Arc::new(dest_tree)).await;

        let end_time = chrono::Utc::now().timestamp();
        info!(
            "同步任务完成: {} - 上传 {}, 跳过 {}, 失败 {}",
            run_id,
            results.uploaded.len(),
            results.skipped.len(),
            results.errors.len()
        );

        Ok(SyncReport {
            runId: run_id,
            startTime: start_time,
            endTime: end_time,
            duration: (end_time - start_time).max(0) as u64,
            sourceFiles: source_count as u64,
            destinationObjects: dest_count as u64,
            bytesTransferred: results.bytes_uploaded(),
            results,
        })
    }

    /// 并发扫描两侧，任一侧失败则整次运行失败
    async fn enumerate(
        &self,
    ) -> Result<(Vec<SourceFile>, HashMap<String, DestinationObject>), SyncError> {
        let prefix = self.config.dest_prefix.as_deref().unwrap_or("");
        let result = tokio::try_join!(
            scan_source(self.source.as_ref(), &self.config.source_root),
            scan_destination(self.dest.as_ref(), prefix),
        );

        match result {
            Ok((files, tree)) => {
                info!("在 Dropbox 中找到 {} 个文件", files.len());
                info!("在 S3 中找到 {} 个对象", tree.len());
                Ok((files, tree))
            }
            Err(e) => {
                error!("扫描失败: {}", e);
                Err(e)
            }
        }
    }

    /// 逐文件判断并传输，单个文件失败不影响其他文件
    ///
    /// 目标 key 相同的文件归为一组，组内按源列举顺序串行处理，最后列举的文件
    /// 最终写入；组之间由信号量限制并发。结果按源列举顺序合并。
    pub async fn process(
        &self,
        files: Vec<SourceFile>,
        dest_tree: Arc<HashMap<String, DestinationObject>>,
    ) -> SyncOutcome {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers.max(1)));
        let executor = TransferExecutor::new(self.source.clone(), self.dest.clone());
        let total = files.len();
        let groups = group_by_key(self.config.dest_prefix.as_deref(), files);
        let mut handles = Vec::with_capacity(groups.len());

        for group in groups {
            let semaphore = semaphore.clone();
            let executor = executor.clone();
            let dest_tree = dest_tree.clone();
            let comparator = self.comparator;
            let paths: Vec<(usize, String)> = group
                .iter()
                .map(|(index, _, file)| (*index, file.path_display.clone()))
                .collect();

            if group.len() > 1 {
                warn!("{} 个文件映射到同一目标 key: {}", group.len(), group[0].1);
            }

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return group
                        .into_iter()
                        .map(|(index, _, file)| {
                            let failed = FileOutcome::Failed(ErrorEntry {
                                file: file.path_display,
                                error: "transfer queue closed".to_string(),
                            });
                            (index, failed)
                        })
                        .collect::<Vec<_>>();
                };

                let mut outcomes = Vec::with_capacity(group.len());
                for (index, key, file) in group {
                    let outcome =
                        Self::process_file(&executor, &comparator, &dest_tree, key, file).await;
                    outcomes.push((index, outcome));
                }
                outcomes
            });

            handles.push((paths, handle));
        }

        let mut slots: Vec<Option<FileOutcome>> = vec![None; total];
        for (paths, handle) in handles {
            match handle.await {
                Ok(outcomes) => {
                    for (index, outcome) in outcomes {
                        slots[index] = Some(outcome);
                    }
                }
                Err(e) => {
                    for (index, path) in paths {
                        warn!("任务失败: {} - {}", path, e);
                        slots[index] = Some(FileOutcome::Failed(ErrorEntry {
                            file: path,
                            error: format!("worker task failed: {}", e),
                        }));
                    }
                }
            }
        }

        let mut outcome = SyncOutcome::default();
        for result in slots.into_iter().flatten() {
            outcome.record(result);
        }
        outcome
    }

    async fn process_file(
        executor: &TransferExecutor,
        comparator: &FileComparator,
        dest_tree: &HashMap<String, DestinationObject>,
        key: String,
        file: SourceFile,
    ) -> FileOutcome {
        match comparator.decide(&file, &key, dest_tree) {
            SyncDecision::Skip => {
                info!("跳过（已是最新）: {}", file.path_display);
                FileOutcome::Skipped(file.path_display)
            }
            SyncDecision::Upload(reason) => {
                info!("同步: {} -> {} ({})", file.path_display, key, reason);
                match executor.transfer(&file, &key).await {
                    Ok(bytes) => {
                        debug!("上传成功: {} ({}字节)", key, bytes);
                        FileOutcome::Uploaded(UploadedEntry {
                            dropboxPath: file.path_display,
                            s3Key: key,
                            size: file.size,
                        })
                    }
                    Err(e) => {
                        error!("同步失败: {} - {}", file.path_display, e);
                        FileOutcome::Failed(ErrorEntry {
                            file: file.path_display,
                            error: e.to_string(),
                        })
                    }
                }
            }
        }
    }
}

/// 源列举序号、目标 key、源文件
type QueuedFile = (usize, String, SourceFile);

/// 按目标 key 分组，组的顺序和组内顺序都保持源列举顺序
fn group_by_key(prefix: Option<&str>, files: Vec<SourceFile>) -> Vec<Vec<QueuedFile>> {
    let mut groups: Vec<Vec<QueuedFile>> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();

    for (index, file) in files.into_iter().enumerate() {
        let key = destination_key(prefix, &file.name);
        let slot = *slot_of.entry(key.clone()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push((index, key, file));
    }

    groups
}
