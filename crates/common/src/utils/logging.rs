use std::io;
use std::path::Path;

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the daily log files; the date is appended per day.
pub const LOG_FILE_PREFIX: &str = "server.log";

/// Daily rolling appender writing `<dir>/server.log.YYYY-MM-DD`.
pub fn file_appender(dir: impl AsRef<Path>) -> RollingFileAppender {
    rolling::daily(dir, LOG_FILE_PREFIX)
}

/// Initialize tracing with a stdout layer and, when `log_dir` is given, a
/// daily rolling file layer.
/// - Respects `RUST_LOG` if set
/// - `json` switches stdout to structured output
///
/// The returned guard flushes the file writer on drop, so keep it alive for
/// the life of the process.
pub fn init_logging(json: bool, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let default_filter = if json {
        "info,service::resource=debug,sqlx=warn"
    } else {
        "info,tower_http=info,axum=info,sqlx=warn"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (compact, structured) = if json {
        (None, Some(fmt::layer().with_target(true).json().with_writer(io::stdout)))
    } else {
        (Some(fmt::layer().with_target(false).compact().with_writer(io::stdout)), None)
    };

    let (file, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(dir));
            (Some(fmt::layer().with_ansi(false).with_target(true).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(compact)
        .with(structured)
        .with(file)
        .try_init();
    guard
}

/// Pick the stdout format by `LOG_FORMAT` (`json` or anything else for
/// compact) and mirror everything into daily files under `log_dir`.
pub fn init_logging_from_env(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let json = matches!(std::env::var("LOG_FORMAT").ok().as_deref(), Some("json"));
    init_logging(json, log_dir)
}
