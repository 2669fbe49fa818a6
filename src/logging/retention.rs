use super::{LoggingConfig, log_file_path};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::error;

/// 周期清理历史日志, 午夜时通知写入器切换文件
pub(super) fn spawn_maintenance(
    runtime: &Handle,
    config: LoggingConfig,
    rotate_requested: Arc<AtomicBool>,
) {
    runtime.spawn(async move {
        let period = Duration::from_secs(config.cleanup_interval_seconds.max(1));
        let mut cleanup_interval = tokio::time::interval(period);
        let mut next_rollover = next_rollover_instant(Local::now());

        loop {
            tokio::select! {
                _ = cleanup_interval.tick() => {
                    if let Err(err) = cleanup_logs(&config, Local::now().date_naive()) {
                        error!("清理历史日志失败: {}", err);
                    }
                }
                _ = tokio::time::sleep_until(next_rollover) => {
                    rotate_requested.store(true, Ordering::Release);
                    if let Err(err) = cleanup_logs(&config, Local::now().date_naive()) {
                        error!("翻滚后清理日志失败: {}", err);
                    }
                    next_rollover = next_rollover_instant(Local::now());
                }
            }
        }
    });
}

/// 删除超过保留期的日志, 压缩今天之前的未压缩日志
fn cleanup_logs(config: &LoggingConfig, today: NaiveDate) -> Result<()> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(());
    }
    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_log_file_name(&name, &config.file_prefix) else {
            continue;
        };
        let path = entry.path();
        if date < cutoff {
            fs::remove_file(&path)
                .with_context(|| format!("删除过期日志失败, path={}", path.display()))?;
        } else if config.compress_history && !compressed && date < today {
            compress_to_gz(&path)?;
        }
    }
    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }
    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path).with_context(|| format!("删除已压缩日志失败, path={}", path.display()))
}

/// 解析 `<prefix>.<YYYY-MM-DD>.log[.gz]`, 返回 (日期, 是否已压缩)
fn parse_log_file_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    let (date_part, compressed) = match rest.strip_suffix(".log.gz") {
        Some(date_part) => (date_part, true),
        None => (rest.strip_suffix(".log")?, false),
    };
    if date_part.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    Some((date, compressed))
}

/// 下一个本地午夜对应的 tokio 时刻, 无法换算时 1 秒后重试
fn next_rollover_instant(now: DateTime<Local>) -> Instant {
    let fallback = Instant::now() + Duration::from_secs(1);
    let Some(midnight) = (now.date_naive() + ChronoDuration::days(1)).and_hms_opt(0, 0, 0) else {
        return fallback;
    };
    let Some(local) = Local.from_local_datetime(&midnight).earliest() else {
        return fallback;
    };
    let target = SystemTime::from(local.with_timezone(&Utc));
    let wait = target
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Instant::now() + wait
}
