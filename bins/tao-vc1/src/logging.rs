//! 日志初始化模块.
//!
//! 解码器通过 `log` 门面输出, 由 tracing-subscriber 接管:
//! - console: 写到 stderr (stdout 可能用于 YUV 输出), 彩色, 级别由 -v/-vv 决定
//! - file: 指定 `--log-dir` 时按天滚动写入 `{dir}/tao-vc1.{date}.log`, `TAO_LOG` 可覆盖过滤规则

use chrono::{Datelike, Local, Timelike};
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// 初始化日志系统
pub fn init(verbosity: u8, log_dir: Option<&Path>) {
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(EnvFilter::new(level_for(verbosity)));

    let file_layer = log_dir.and_then(|dir| {
        let appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("tao-vc1")
            .filename_suffix("log")
            .build(dir);
        match appender {
            Ok(appender) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                LOG_GUARD.set(guard).ok();
                let filter = EnvFilter::try_from_env("TAO_LOG")
                    .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity.max(1))));
                Some(
                    fmt::Layer::default()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .event_format(FileFormatter)
                        .with_filter(filter),
                )
            }
            Err(e) => {
                eprintln!("警告: 无法创建日志文件 ({}): {e}", dir.display());
                None
            }
        }
    });

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn write_timestamp(writer: &mut Writer<'_>) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis(),
    )
}

/// Console 格式: 彩色级别 + 时间戳
struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
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
        write_timestamp(&mut writer)?;
        let level = *event.metadata().level();
        let color = match level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(writer, "{color}{level:5}\x1b[0m > ")?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 时间戳 + 级别 + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
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
        write_timestamp(&mut writer)?;
        write!(writer, "{:5} > ", event.metadata().level())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
