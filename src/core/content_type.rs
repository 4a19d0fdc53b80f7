/// 未知扩展名时的默认类型
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 根据文件扩展名推断 Content-Type
///
/// 扩展名取最后一个 `.` 之后的部分（忽略大小写）；没有 `.` 或不在表中时
/// 返回 `application/octet-stream`。
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    let Some((_, ext)) = lower.rsplit_once('.') else {
        return DEFAULT_CONTENT_TYPE;
    };

    match ext {
        // 图片
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "svg" => "image/svg+xml",
        // 视频
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        // 文档
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        // 其他
        "json" => "application/json",
        "txt" => "text/plain",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
