use crate::core::pager::paginate;
use crate::error::SyncError;
use crate::storage::{DestinationObject, DestinationStorage, SourceFile, SourceStorage};
use futures::TryStreamExt;
use std::collections::HashMap;
use std::pin::pin;
use tracing::{debug, info};

/// 列举源端 `root` 下的所有文件（递归，仅文件）
///
/// 逐页跟随游标直到结束。任一页失败即返回 `Listing` 错误：不完整的源列表
/// 会让后续判断出错，因此不做部分返回。
pub async fn scan_source(
    storage: &dyn SourceStorage,
    root: &str,
) -> Result<Vec<SourceFile>, SyncError> {
    info!("开始扫描源存储: {}, root: {:?}", storage.name(), root);

    let mut pages = pin!(paginate(move |cursor: Option<String>| async move {
        storage.list_page(root, cursor.as_deref()).await
    }));

    let mut files = Vec::new();
    let mut page_count = 0usize;
    while let Some(entries) = pages
        .try_next()
        .await
        .map_err(|e| SyncError::listing("Dropbox", &e))?
    {
        page_count += 1;
        debug!("源存储第 {} 页: {} 个文件", page_count, entries.len());
        files.extend(entries);
    }

    info!("源存储扫描完成: {} 页, {} 个文件", page_count, files.len());
    Ok(files)
}

/// 列举目标端 `prefix` 下的所有对象，按完整 key 建表
pub async fn scan_destination(
    storage: &dyn DestinationStorage,
    prefix: &str,
) -> Result<HashMap<String, DestinationObject>, SyncError> {
    info!("开始扫描目标存储: {}, prefix: {:?}", storage.name(), prefix);

    let mut pages = pin!(paginate(move |token: Option<String>| async move {
        storage.list_page(prefix, token.as_deref()).await
    }));

    let mut tree = HashMap::new();
    let mut page_count = 0usize;
    while let Some(entries) = pages
        .try_next()
        .await
        .map_err(|e| SyncError::listing("S3", &e))?
    {
        page_count += 1;
        debug!("目标存储第 {} 页: {} 个对象", page_count, entries.len());
        for object in entries {
            tree.insert(object.key.clone(), object);
        }
    }

    info!("目标存储扫描完成: {} 页, {} 个对象", page_count, tree.len());
    Ok(tree)
}
