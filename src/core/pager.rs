//! 通用分页游标遍历
//!
//! 把"请求一页 -> 拿到下一页游标 -> 直到游标为空"抽象成惰性的 `Stream`，
//! 与具体 SDK 的分页形式无关。Dropbox 的 `has_more + cursor` 和
//! S3 的 `NextContinuationToken` 都通过这里展开。

use crate::storage::Page;
use anyhow::Result;
use futures::stream::{self, Stream};
use std::future::Future;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// 逐页产出记录，直到某页不再返回游标
///
/// `fetch(None)` 请求第一页，之后用上一页返回的游标继续；空游标等同于结束。
/// 任一页失败时流产出该错误后结束。
pub fn paginate<T, F, Fut>(mut fetch: F) -> impl Stream<Item = Result<Vec<T>>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    stream::try_unfold(Cursor::Start, move |cursor| {
        let request = match cursor {
            Cursor::Start => Some(fetch(None)),
            Cursor::Next(token) => Some(fetch(Some(token))),
            Cursor::Done => None,
        };

        async move {
            let Some(request) = request else {
                return Ok::<_, anyhow::Error>(None);
            };
            let page = request.await?;
            let next = match page.next {
                Some(token) if !token.is_empty() => Cursor::Next(token),
                _ => Cursor::Done,
            };
            Ok(Some((page.entries, next)))
        }
    })
}
