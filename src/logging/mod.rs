//! 解码工具的日志系统.
//!
//! 控制台与按日期命名的文件双输出. 熵解码 crate 通过 `log` 门面打点,
//! 由 tracing-subscriber 的 log 桥接统一汇入这里.
//! 历史日志的压缩与过期清理由后台维护任务完成 (见 `retention`).

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod retention;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 文件日志过滤指令, 如 `info` 或 `avc_codec=trace`
    pub level: String,
    /// 控制台过滤指令
    #[serde(default = "default_console_level")]
    pub console_level: String,
    pub directory: String,
    pub file_prefix: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_true")]
    pub compress_history: bool,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_console_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> i64 {
    30
}

fn default_cleanup_interval() -> u64 {
    3600
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_level: default_console_level(),
            directory: "logs".to_string(),
            file_prefix: "avc".to_string(),
            retention_days: default_retention_days(),
            compress_history: true,
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 初始化全局日志, 进程内只能调用一次
///
/// 必须在 tokio 运行时内调用, 维护任务挂在当前运行时上.
pub fn init(config: LoggingConfig) -> Result<()> {
    let runtime = tokio::runtime::Handle::try_current().context("日志维护任务需要 tokio 运行时")?;
    let console_filter = EnvFilter::try_new(&config.console_level)
        .with_context(|| format!("控制台日志过滤指令无效, level={}", config.console_level))?;
    let file_filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("文件日志过滤指令无效, level={}", config.level))?;

    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败, directory={}", config.directory))?;

    let rotate_requested = Arc::new(AtomicBool::new(false));
    let file_writer = DailyFileWriter::new(
        Path::new(&config.directory),
        &config.file_prefix,
        Arc::clone(&rotate_requested),
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_writer);
    LOG_GUARD.set(guard).ok();

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(LineFormatter { ansi: true })
        .with_filter(console_filter);

    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(LineFormatter { ansi: false })
        .with_filter(file_filter);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("全局日志订阅器已初始化")?;

    retention::spawn_maintenance(&runtime, config, rotate_requested);
    Ok(())
}

/// 当天日志文件路径: `<prefix>.<YYYY-MM-DD>.log`
pub fn log_file_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

// ============================================================
// 按日期切换的文件写入器
// ============================================================

/// 跨午夜时由维护任务置位 `rotate_requested`, 下一次写入时切到新文件
struct DailyFileWriter {
    directory: PathBuf,
    prefix: String,
    rotate_requested: Arc<AtomicBool>,
    file: File,
}

impl DailyFileWriter {
    fn new(directory: &Path, prefix: &str, rotate_requested: Arc<AtomicBool>) -> Result<Self> {
        let path = log_file_path(directory, prefix, Local::now().date_naive());
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            rotate_requested,
            file: open_append(&path)?,
        })
    }
}

impl Write for DailyFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.rotate_requested.swap(false, Ordering::AcqRel) {
            let path = log_file_path(&self.directory, &self.prefix, Local::now().date_naive());
            self.file = open_append(&path).map_err(std::io::Error::other)?;
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

// ============================================================
// 行格式
// ============================================================

/// `[HH:MM:SS.mmm] LEVEL target > 字段`, 控制台按级别着色
struct LineFormatter {
    ansi: bool,
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}:{:02}:{:02}.{:03}] ",
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis()
        )?;
        let level = meta.level().to_string();
        if self.ansi {
            let color = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                _ => "\x1b[34m",
            };
            write!(writer, "{}{:5}\x1b[0m ", color, level)?;
        } else {
            write!(writer, "{:5} ", level)?;
        }
        write!(writer, "{} > ", meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_uses_date() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 6).expect("日期有效");
        let path = log_file_path(Path::new("logs"), "avc-decode", date);
        assert_eq!(path, PathBuf::from("logs/avc-decode.2026-02-06.log"));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: LoggingConfig = serde_json::from_str(
            r#"{"level":"debug","directory":"logs","file_prefix":"avc"}"#,
        )
        .expect("配置应可解析");
        assert_eq!(config.console_level, "warn");
        assert_eq!(config.retention_days, 30);
        assert!(config.compress_history);
        assert_eq!(config.cleanup_interval_seconds, 3600);
    }

    #[test]
    fn test_init_requires_runtime() {
        let err = init(LoggingConfig::default()).expect_err("无运行时应报错");
        assert!(err.to_string().contains("tokio"));
    }
}
