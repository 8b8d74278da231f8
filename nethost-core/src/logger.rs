//! Host diagnostics.
//!
//! All diagnostics go through `tracing`. [`init`] installs a subscriber
//! that writes one line per event to stdout, prefixed so the Functions host
//! picks the line up from the worker's console output:
//!
//! ```text
//! LanguageWorkerConsoleLog[2024-01-01T00:00:00.000000Z] FunctionsNetHost: Going to run placeholder app: '...'
//! ```
//!
//! Logging is best effort: lines go through a non-blocking writer, and
//! write failures or a full queue drop lines instead of reaching the caller.

use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::env::{vars, EnvironmentStore, ProcessEnvironment};

/// Marker the Functions host scans worker stdout for.
pub const CONSOLE_LOG_PREFIX: &str = "LanguageWorkerConsoleLog";

/// Component name stamped on every line.
pub const HOST_NAME: &str = "FunctionsNetHost";

/// Single-line event format understood by the Functions host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogFormat {
    timer: SystemTime,
}

impl<S, N> FormatEvent<S, N> for ConsoleLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{CONSOLE_LOG_PREFIX}[")?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "] {HOST_NAME}: ")?;

        let level = *event.metadata().level();
        if level != Level::INFO {
            write!(writer, "{level} ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Whether trace-level diagnostics were requested through the environment.
pub fn trace_requested(env: &dyn EnvironmentStore) -> bool {
    env.is_enabled(vars::NETHOST_TRACE)
}

/// Console-format subscriber writing plain (escape-free) lines to `writer`.
pub fn console_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(ConsoleLogFormat::default())
        .with_writer(writer)
        .finish()
}

/// Install the process-wide subscriber.
///
/// Lines are handed to a background writer thread, so a stalled stdout
/// never blocks the thread that logs. The returned guard flushes pending
/// lines on drop and must be held until the process is done logging.
///
/// `verbose`, or `AZURE_FUNCTIONS_NETHOST_TRACE=1`, raises the level to
/// `trace`; otherwise `RUST_LOG` is honoured with `info` as the default.
/// Returns `None` if a subscriber was already installed.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let filter = if verbose || trace_requested(&ProcessEnvironment) {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing::subscriber::set_global_default(console_subscriber(filter, writer)).ok()?;
    Some(guard)
}
