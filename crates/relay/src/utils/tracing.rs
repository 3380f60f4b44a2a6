use std::fmt;
use std::sync::OnceLock;

use time::macros::format_description;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format, time::FormatTime, FmtContext, FormatEvent, FormatFields, FormattedFields,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

struct BracketedTime;

impl FormatTime for BracketedTime {
    fn format_time(&self, w: &mut format::Writer<'_>) -> fmt::Result {
        let now = time::OffsetDateTime::now_utc();
        let formatted = now
            .format(&format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .map_err(|_| fmt::Error)?;
        write!(w, "[{}]", formatted)
    }
}

/// `[2026-10-16 12:00:00.000][info] request_id=... message fields`
struct BracketedFormatter;

impl<S, N> FormatEvent<S, N> for BracketedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        BracketedTime.format_time(&mut writer)?;

        write!(
            writer,
            "[{}]",
            event.metadata().level().to_string().to_lowercase()
        )?;

        if let Some(request_id) = request_id_from_scope(ctx) {
            write!(writer, " request_id={}", request_id)?;
        }

        write!(writer, " ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn request_id_from_scope<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let scope = ctx.event_scope()?;
    for span in scope.from_root() {
        let extensions = span.extensions();
        if let Some(fields) = extensions.get::<FormattedFields<N>>() {
            if let Some(request_id) = extract_field(fields.fields.as_str(), "request_id") {
                return Some(request_id.to_string());
            }
        }
    }
    None
}

fn extract_field<'a>(fields: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("{}=", name);
    let start = fields.find(&key)? + key.len();
    let rest = &fields[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

static INIT_LOGGER: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. `RUST_LOG` selects levels, `info`
/// otherwise.
pub fn init_logging() {
    INIT_LOGGER.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // no ANSI so span fields stay parseable
        let fmt_layer = tracing_subscriber::fmt::layer()
            .event_format(BracketedFormatter)
            .fmt_fields(format::DefaultFields::new())
            .with_ansi(false);

        if let Err(err) = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
        {
            eprintln!("failed to install tracing subscriber: {}", err);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_request_id_field() {
        assert_eq!(
            extract_field("request_id=abc-123 path=/v1/chat", "request_id"),
            Some("abc-123")
        );
        assert_eq!(extract_field("request_id=tail", "request_id"), Some("tail"));
        assert_eq!(extract_field("path=/v1/chat", "request_id"), None);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        tracing::info!("logging initialised twice without panicking");
    }
}
