//! 日志模块 - 控制台日志与按大小轮转的文件日志

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_LOG_MAX_SIZE_MB: &str = "LOG_MAX_SIZE_MB";

const LOG_FILE_NAME: &str = "app.log";

/// 依赖库的日志只保留警告以上
const QUIET_TARGETS: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "reqwest=warn",
    "aws_config=warn",
    "aws_smithy_runtime=warn",
    "aws_sdk_s3=warn",
];

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// 是否启用日志记录（LOG_LEVEL=off 时关闭）
    pub enabled: bool,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// 最大日志文件大小（MB）
    pub max_size_mb: u32,
    /// 文件日志目录，未设置时只输出到控制台
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_max_size_mb() -> u32 {
    5 // 默认 5MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_level(),
            max_size_mb: default_max_size_mb(),
            log_dir: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 无效值回退到默认值，不会让运行失败
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let level = get(ENV_LOG_LEVEL)
            .map(|l| l.to_lowercase())
            .unwrap_or_else(default_level);

        Self {
            enabled: level != "off",
            level,
            max_size_mb: get(ENV_LOG_MAX_SIZE_MB)
                .and_then(|v| v.parse().ok())
                .filter(|mb| *mb > 0)
                .unwrap_or_else(default_max_size_mb),
            log_dir: get(ENV_LOG_DIR).map(PathBuf::from),
        }
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut directives = vec![self.tracing_level().to_string().to_lowercase()];
        directives.extend(QUIET_TARGETS.iter().map(|d| d.to_string()));
        EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// 初始化全局日志
///
/// 返回的 guard 需要持有到进程结束，否则缓冲中的日志会丢失。
/// 重复初始化时静默忽略。
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    if !config.enabled {
        return None;
    }

    let (console, guard) = tracing_appender::non_blocking(io::stdout());
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(console)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    // 文件日志创建失败时只输出到控制台
    let file_layer = config.log_dir.as_deref().and_then(|dir| {
        match SizeRotatingWriter::new(dir, config.max_size_mb) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false),
            ),
            Err(e) => {
                eprintln!("无法创建日志文件 {:?}: {}", dir, e);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(config.env_filter())
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Some(guard)
}

type SharedWriter = Arc<Mutex<Option<BufWriter<File>>>>;

/// 带大小限制的日志写入器
///
/// 超过上限时 `app.log` 轮转为 `app.log.old`，只保留一个备份。
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    writer: SharedWriter,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        Self::with_max_bytes(log_dir, (max_size_mb as u64) * 1024 * 1024)
    }

    pub fn with_max_bytes(log_dir: &Path, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE_NAME);
        let writer = open_file(&file_path, max_size)?;

        Ok(Self {
            file_path,
            max_size,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn lock(writer: &SharedWriter) -> MutexGuard<'_, Option<BufWriter<File>>> {
    writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn open_file(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
    // 启动时已超限的旧文件先轮转
    if fs::metadata(file_path).map(|m| m.len() > max_size).unwrap_or(false) {
        rotate_log(file_path)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;

    Ok(BufWriter::new(file))
}

fn rotate_log(file_path: &Path) -> io::Result<()> {
    let backup_path = file_path.with_extension("log.old");
    if backup_path.exists() {
        fs::remove_file(&backup_path)?;
    }
    fs::rename(file_path, &backup_path)
}

/// 日志写入器包装
pub struct LogWriter {
    inner: SharedWriter,
    file_path: PathBuf,
    max_size: u64,
}

impl LogWriter {
    fn rotate_if_needed(&self, guard: &mut Option<BufWriter<File>>) -> io::Result<()> {
        let size = fs::metadata(&self.file_path).map(|m| m.len()).unwrap_or(0);
        if size <= self.max_size {
            return Ok(());
        }

        if let Some(mut w) = guard.take() {
            let _ = w.flush();
        }
        rotate_log(&self.file_path)?;
        *guard = Some(open_file(&self.file_path, self.max_size)?);
        Ok(())
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = lock(&self.inner);

        let Some(writer) = guard.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "Writer not available"));
        };
        let written = writer.write(buf)?;
        writer.flush()?;

        self.rotate_if_needed(&mut guard)?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.inner).as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.writer.clone(),
            file_path: self.file_path.clone(),
            max_size: self.max_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_from_lookup() {
        let config = LogConfig::from_lookup(|key| match key {
            ENV_LOG_LEVEL => Some("DEBUG".to_string()),
            ENV_LOG_DIR => Some("/var/log/dropsync".to_string()),
            ENV_LOG_MAX_SIZE_MB => Some("not-a-number".to_string()),
            _ => None,
        });

        assert!(config.enabled);
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/dropsync")));
        assert_eq!(config.max_size_mb, 5);
    }

    #[test]
    fn test_off_disables_logging() {
        let config = LogConfig::from_lookup(|key| (key == ENV_LOG_LEVEL).then(|| "off".to_string()));
        assert!(!config.enabled);
        assert!(init(&config).is_none());
    }

    #[test]
    fn test_writer_rotates_past_limit() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SizeRotatingWriter::with_max_bytes(dir.path(), 16).unwrap();

        let mut w = writer.make_writer();
        w.write_all(b"0123456789abcdefXYZ\n").unwrap();
        w.write_all(b"next\n").unwrap();
        w.flush().unwrap();

        let backup = fs::read_to_string(dir.path().join("app.log.old")).unwrap();
        let current = fs::read_to_string(writer.file_path()).unwrap();
        assert_eq!(backup, "0123456789abcdefXYZ\n");
        assert_eq!(current, "next\n");
    }

    #[test]
    fn test_writer_appends_below_limit() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SizeRotatingWriter::new(dir.path(), 1).unwrap();

        writer.make_writer().write_all(b"a\n").unwrap();
        writer.make_writer().write_all(b"b\n").unwrap();

        assert_eq!(fs::read_to_string(writer.file_path()).unwrap(), "a\nb\n");
        assert!(!dir.path().join("app.log.old").exists());
    }
}
