//! Event command handlers.

use std::str::FromStr;

use serde::Serialize;
use tabled::Tabled;

use netbridge_core::{Event, EventKind, LiveSession, SessionConfig};

use crate::cli::{EventsArgs, EventsCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct KindInfo {
    name: &'static str,
    description: &'static str,
}

#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Type")]
    name: &'static str,
    #[tabled(rename = "Description")]
    description: &'static str,
}

fn describe(kind: EventKind) -> &'static str {
    match kind {
        EventKind::RouterStatus => "A router came online, went offline or changed state",
        EventKind::VoucherActivated => "A customer redeemed a voucher",
        EventKind::IncomeRecorded => "Revenue was booked for a voucher",
        EventKind::DashboardStats => "Fresh dashboard counters and chart series",
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: EventsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        EventsCommand::Types => {
            let kinds: Vec<KindInfo> = EventKind::ALL
                .iter()
                .map(|&kind| KindInfo {
                    name: kind.as_str(),
                    description: describe(kind),
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &kinds,
                |k| KindRow {
                    name: k.name,
                    description: k.description,
                },
                |k| k.name.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EventsCommand::Watch { types, count } => {
            let filter = parse_types(types.as_deref())?;
            let session_config = config::resolve_session_config(global)?;
            watch(session_config, filter.as_deref(), count, global).await
        }
    }
}

/// Parse `--types` into event kinds. `None` means everything.
fn parse_types(types: Option<&[String]>) -> Result<Option<Vec<EventKind>>, CliError> {
    let Some(types) = types else {
        return Ok(None);
    };

    types
        .iter()
        .map(|name| {
            EventKind::from_str(name.trim()).map_err(|_| CliError::Validation {
                field: "types".into(),
                reason: format!(
                    "unknown event type '{name}'. Valid types: {}",
                    EventKind::ALL.map(EventKind::as_str).join(", ")
                ),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

// ── Watch loop ──────────────────────────────────────────────────────

enum Step {
    Stop,
    State,
    Event(std::sync::Arc<Event>),
}

async fn watch(
    session_config: SessionConfig,
    filter: Option<&[EventKind]>,
    count: Option<usize>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if count == Some(0) {
        return Ok(());
    }

    let painter = Painter::new(&global.color);
    let session = LiveSession::new(session_config)?;
    let mut events = session.events();
    let mut states = session.watch_connection();

    tracing::debug!(api_url = %session.config().api_url, "starting event watch");
    session.start();

    let interrupted = super::interrupted();
    tokio::pin!(interrupted);

    let mut shown = 0usize;
    loop {
        let step = tokio::select! {
            () = &mut interrupted => Step::Stop,
            changed = states.changed() => match changed {
                Ok(()) => Step::State,
                Err(_) => Step::Stop,
            },
            event = events.recv() => event.map_or(Step::Stop, Step::Event),
        };

        match step {
            Step::Stop => break,
            Step::State => {
                let state = *states.borrow_and_update();
                super::report_state(state, painter, global.quiet);
            }
            Step::Event(event) => {
                if filter.is_some_and(|kinds| !kinds.contains(&event.kind())) {
                    continue;
                }
                let line = render_event(&event, &global.output, painter)?;
                output::print_output(&line, global.quiet);

                shown += 1;
                if count.is_some_and(|limit| shown >= limit) {
                    break;
                }
            }
        }
    }

    session.stop();

    if events.dropped() > 0 {
        tracing::warn!(
            dropped = events.dropped(),
            "output fell behind the stream, oldest events were skipped"
        );
    }
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────────

/// Render one event for streaming output.
///
/// Table mode prints a single aligned line per event; `json-compact`
/// yields newline-delimited JSON; YAML emits one document per event.
fn render_event(event: &Event, format: &OutputFormat, painter: Painter) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => format!(
            "{}  {}  {}",
            painter.dim(&clock_time(event)),
            painter.accent(&format!("{:<17}", event.kind().as_str())),
            summary(event, painter)
        ),
        OutputFormat::Json => serde_json::to_string_pretty(event)?,
        OutputFormat::JsonCompact => serde_json::to_string(event)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(event)?.trim_end()),
        OutputFormat::Plain => format!("{}\t{}", event.kind(), subject(event)),
    })
}

/// Local wall-clock time of the event, or the raw timestamp if the
/// backend sent something unparseable.
fn clock_time(event: &Event) -> String {
    event.timestamp_utc().map_or_else(
        || event.timestamp().to_owned(),
        |t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string(),
    )
}

/// The identifier an event is about.
fn subject(event: &Event) -> &str {
    match event {
        Event::RouterStatus(r) => &r.router_id,
        Event::VoucherActivated(v) => &v.code,
        Event::IncomeRecorded(i) => &i.voucher_code,
        Event::DashboardStats(s) => &s.timestamp,
    }
}

fn summary(event: &Event, painter: Painter) -> String {
    match event {
        Event::RouterStatus(r) => format!(
            "{} ({}) is {}",
            r.router_name,
            r.router_id,
            painter.status(&r.status)
        ),
        Event::VoucherActivated(v) => {
            format!("voucher {} activated on {} ({:.2})", v.code, v.plan_name, v.price)
        }
        Event::IncomeRecorded(i) => format!(
            "{} from {} ({})",
            painter.good(&format!("+{:.2}", i.amount)),
            i.voucher_code,
            i.plan_name
        ),
        Event::DashboardStats(s) => format!(
            "{}/{} routers online, {} active vouchers, today {:.2} ({})",
            s.routers_online, s.total_routers, s.active_vouchers, s.today_income, s.income_change
        ),
    }
}
