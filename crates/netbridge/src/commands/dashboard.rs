//! Dashboard command handler.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use tabled::Tabled;

use netbridge_core::{Activity, DashboardSnapshot, DashboardStream, LiveSession, RouterSummary};

use crate::cli::{DashboardArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct RouterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

impl From<&RouterSummary> for RouterRow {
    fn from(r: &RouterSummary) -> Self {
        Self {
            name: r.name.clone(),
            id: r.id.clone(),
            status: r.status.clone(),
            last_seen: r.last_seen.as_deref().map_or_else(|| "-".into(), local_time),
        }
    }
}

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    kind: &'static str,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&Activity> for ActivityRow {
    fn from(a: &Activity) -> Self {
        let (kind, detail) = match a {
            Activity::VoucherActivated {
                code,
                plan_name,
                price,
                ..
            } => ("voucher", format!("{code} on {plan_name} ({price:.2})")),
            Activity::IncomeRecorded {
                amount,
                plan_name,
                voucher_code,
                ..
            } => ("income", format!("+{amount:.2} from {voucher_code} ({plan_name})")),
        };
        Self {
            time: local_time(a.timestamp()),
            kind,
            detail,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DashboardArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session_config = config::resolve_session_config(global)?;
    let painter = Painter::new(&global.color);

    let session = LiveSession::new(session_config)?;
    let mut stream = session.watch();
    session.start();

    let result = if args.once {
        show_once(&mut stream, Duration::from_secs(args.wait), global, painter).await
    } else {
        follow(&mut stream, global, painter).await
    };

    session.stop();
    result
}

/// Wait for the first live statistics (or the timeout), print, return.
async fn show_once(
    stream: &mut DashboardStream,
    wait: Duration,
    global: &GlobalOpts,
    painter: Painter,
) -> Result<(), CliError> {
    let interrupted = super::interrupted();
    tokio::pin!(interrupted);
    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);

    let mut snapshot = Arc::clone(stream.current());
    while !snapshot.is_live {
        let next = tokio::select! {
            biased;
            () = &mut interrupted => return Ok(()),
            () = &mut deadline => None,
            next = stream.changed() => next,
        };
        match next {
            Some(next) => snapshot = next,
            None => {
                tracing::warn!(
                    wait_secs = wait.as_secs(),
                    "dashboard did not go live, showing the last known state"
                );
                break;
            }
        }
    }

    let out = render_snapshot(&snapshot, &global.output, painter)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Re-render on every change until Ctrl-C.
async fn follow(
    stream: &mut DashboardStream,
    global: &GlobalOpts,
    painter: Painter,
) -> Result<(), CliError> {
    let redraw = matches!(global.output, OutputFormat::Table) && std::io::stdout().is_terminal();

    let interrupted = super::interrupted();
    tokio::pin!(interrupted);

    let mut snapshot = Arc::clone(stream.current());
    loop {
        let mut out = render_snapshot(&snapshot, &global.output, painter)?;
        if redraw {
            out.insert_str(0, "\x1b[2J\x1b[H");
        }
        output::print_output(&out, global.quiet);

        let next = tokio::select! {
            biased;
            () = &mut interrupted => None,
            next = stream.changed() => next,
        };
        match next {
            Some(next) => snapshot = next,
            None => return Ok(()),
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn render_snapshot(
    snapshot: &DashboardSnapshot,
    format: &OutputFormat,
    painter: Painter,
) -> Result<String, CliError> {
    output::render_single(
        format,
        snapshot,
        |s| detail(s, painter),
        |s| if s.is_live { "live" } else { "offline" }.into(),
    )
}

fn detail(s: &DashboardSnapshot, painter: Painter) -> String {
    let mut out = String::new();

    let indicator = if s.is_live {
        painter.good("● live")
    } else {
        painter.bad("○ offline")
    };
    match s.last_update {
        Some(at) => {
            let at = at.with_timezone(&chrono::Local).format("%H:%M:%S");
            let _ = writeln!(out, "{indicator}  {}", painter.dim(&format!("updated {at}")));
        }
        None => {
            let _ = writeln!(out, "{indicator}");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Routers    {}/{} online{}",
        s.routers_online,
        s.total_routers,
        change(&s.routers_change)
    );
    let _ = writeln!(out, "Vouchers   {} active", s.active_vouchers);
    let _ = writeln!(
        out,
        "Revenue    {:.2} total, {:.2} today{}",
        s.total_revenue,
        s.today_income,
        change(&s.income_change)
    );

    if !s.income_chart.is_empty() {
        let points: Vec<String> = s
            .income_chart
            .iter()
            .map(|p| format!("{} {:.2}", p.name, p.value))
            .collect();
        let _ = writeln!(out, "Income     {}", points.join(" · "));
    }
    if !s.voucher_distribution.is_empty() {
        let shares: Vec<String> = s
            .voucher_distribution
            .iter()
            .map(|v| format!("{} {}", v.name, v.value))
            .collect();
        let _ = writeln!(out, "Plans      {}", shares.join(" · "));
    }

    if !s.routers.is_empty() {
        let rows: Vec<RouterRow> = s.routers.iter().map(RouterRow::from).collect();
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", output::render_table(&rows));
    }

    if !s.recent_activity.is_empty() {
        let rows: Vec<ActivityRow> = s.recent_activity.iter().map(ActivityRow::from).collect();
        let _ = writeln!(out);
        let _ = writeln!(out, "Recent activity");
        let _ = writeln!(out, "{}", output::render_table(&rows));
    }

    out.trim_end().to_owned()
}

fn change(delta: &str) -> String {
    if delta.is_empty() {
        String::new()
    } else {
        format!(" ({delta})")
    }
}

/// Local wall-clock time for a backend timestamp, or the raw value.
fn local_time(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts).map_or_else(
        |_| ts.to_owned(),
        |t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColorMode;

    fn plain() -> Painter {
        Painter::new(&ColorMode::Never)
    }

    fn busy_snapshot() -> DashboardSnapshot {
        let mut snapshot = DashboardSnapshot {
            total_routers: 2,
            routers_online: 1,
            active_vouchers: 7,
            total_revenue: 1520.0,
            today_income: 120.5,
            income_change: "+12%".into(),
            is_live: true,
            ..DashboardSnapshot::default()
        };
        snapshot
            .routers
            .push(RouterSummary::new("r-1", "Lobby", "online"));
        snapshot.recent_activity.push_front(Activity::IncomeRecorded {
            amount: 50.0,
            plan_name: "Daily".into(),
            voucher_code: "ABC123".into(),
            timestamp: "not-a-time".into(),
        });
        snapshot
    }

    #[test]
    fn detail_shows_counters_routers_and_activity() {
        let text = detail(&busy_snapshot(), plain());
        assert!(text.starts_with("● live"));
        assert!(text.contains("Routers    1/2 online"));
        assert!(text.contains("Vouchers   7 active"));
        assert!(text.contains("1520.00 total, 120.50 today (+12%)"));
        assert!(text.contains("Lobby"));
        assert!(text.contains("+50.00 from ABC123 (Daily)"));
        assert!(text.contains("not-a-time"));
    }

    #[test]
    fn empty_snapshot_is_offline_without_tables() {
        let text = detail(&DashboardSnapshot::default(), plain());
        assert!(text.starts_with("○ offline"));
        assert!(!text.contains("Recent activity"));
        assert!(!text.contains("Income "));
        assert!(!text.contains("Last seen"));
    }

    #[test]
    fn plain_output_is_liveness() {
        let out = render_snapshot(&busy_snapshot(), &OutputFormat::Plain, plain()).unwrap();
        assert_eq!(out, "live");
        let out =
            render_snapshot(&DashboardSnapshot::default(), &OutputFormat::Plain, plain()).unwrap();
        assert_eq!(out, "offline");
    }

    #[test]
    fn json_output_serializes_snapshot() {
        let out = render_snapshot(&busy_snapshot(), &OutputFormat::JsonCompact, plain()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["active_vouchers"], 7);
        assert_eq!(value["routers"][0]["name"], "Lobby");
        assert_eq!(value["recent_activity"][0]["kind"], "income_recorded");
    }

    #[test]
    fn router_rows_mark_missing_last_seen() {
        let row = RouterRow::from(&RouterSummary::new("r-9", "Gate", "offline"));
        assert_eq!(row.last_seen, "-");
    }
}
