// ── Live dashboard reducer ──
//
// Folds stream events into the state a dashboard screen renders. Pure and
// synchronous: `LiveSession` owns the task that feeds it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use netbridge_api::{ChartPoint, Event, IncomeRecorded, VoucherActivated, VoucherShare};
use serde::Serialize;

use crate::config::DEFAULT_ACTIVITY_LIMIT;

/// One router as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    /// Timestamp of the last status event, as sent by the backend.
    pub last_seen: Option<String>,
}

impl RouterSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: status.into(),
            last_seen: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }
}

/// A revenue-side event shown in the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activity {
    VoucherActivated {
        code: String,
        plan_name: String,
        price: f64,
        timestamp: String,
    },
    IncomeRecorded {
        amount: f64,
        plan_name: String,
        voucher_code: String,
        timestamp: String,
    },
}

impl Activity {
    pub fn timestamp(&self) -> &str {
        match self {
            Self::VoucherActivated { timestamp, .. } | Self::IncomeRecorded { timestamp, .. } => {
                timestamp
            }
        }
    }
}

impl From<&VoucherActivated> for Activity {
    fn from(v: &VoucherActivated) -> Self {
        Self::VoucherActivated {
            code: v.code.clone(),
            plan_name: v.plan_name.clone(),
            price: v.price,
            timestamp: v.timestamp.clone(),
        }
    }
}

impl From<&IncomeRecorded> for Activity {
    fn from(i: &IncomeRecorded) -> Self {
        Self::IncomeRecorded {
            amount: i.amount,
            plan_name: i.plan_name.clone(),
            voucher_code: i.voucher_code.clone(),
            timestamp: i.timestamp.clone(),
        }
    }
}

/// Everything the dashboard shows, at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub routers: Vec<RouterSummary>,
    pub total_routers: u64,
    pub routers_online: u64,
    pub active_vouchers: u64,
    pub total_revenue: f64,
    pub today_income: f64,
    pub income_change: String,
    pub routers_change: String,
    pub income_chart: Vec<ChartPoint>,
    pub voucher_distribution: Vec<VoucherShare>,
    /// Newest first.
    pub recent_activity: VecDeque<Activity>,
    /// Whether the numbers are being kept current by the live stream.
    pub is_live: bool,
    pub last_update: Option<DateTime<Utc>>,
}

/// Reducer over [`Event`]s producing a [`DashboardSnapshot`].
#[derive(Debug, Clone)]
pub struct LiveDashboard {
    snapshot: DashboardSnapshot,
    activity_limit: usize,
}

impl Default for LiveDashboard {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_LIMIT)
    }
}

impl LiveDashboard {
    pub fn new(activity_limit: usize) -> Self {
        Self {
            snapshot: DashboardSnapshot::default(),
            activity_limit,
        }
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.snapshot
    }

    /// Replace the router list, e.g. from an initial REST fetch. Live
    /// status events then update it in place.
    pub fn seed_routers(&mut self, routers: impl IntoIterator<Item = RouterSummary>) {
        self.snapshot.routers = routers.into_iter().collect();
    }

    /// Fold one event into the snapshot.
    pub fn apply(&mut self, event: &Event) {
        let snap = &mut self.snapshot;

        match event {
            Event::RouterStatus(status) => {
                if let Some(router) = snap.routers.iter_mut().find(|r| r.id == status.router_id) {
                    router.status.clone_from(&status.status);
                    router.last_seen = Some(status.timestamp.clone());
                } else {
                    snap.routers.push(RouterSummary {
                        id: status.router_id.clone(),
                        name: status.router_name.clone(),
                        status: status.status.clone(),
                        last_seen: Some(status.timestamp.clone()),
                    });
                }
                snap.is_live = true;
            }
            Event::DashboardStats(stats) => {
                snap.total_routers = stats.total_routers;
                snap.routers_online = stats.routers_online;
                snap.active_vouchers = stats.active_vouchers;
                snap.total_revenue = stats.total_revenue;
                snap.today_income = stats.today_income;
                snap.income_change.clone_from(&stats.income_change);
                snap.routers_change.clone_from(&stats.routers_change);
                snap.income_chart.clone_from(&stats.income_chart);
                snap.voucher_distribution.clone_from(&stats.voucher_distribution);
                snap.is_live = true;
            }
            Event::VoucherActivated(voucher) => self.push_activity(voucher.into()),
            Event::IncomeRecorded(income) => self.push_activity(income.into()),
        }

        self.snapshot.last_update = Some(event.timestamp_utc().unwrap_or_else(Utc::now));
    }

    /// Mark the numbers stale. Returns `true` if that changed anything.
    pub fn set_offline(&mut self) -> bool {
        std::mem::replace(&mut self.snapshot.is_live, false)
    }

    fn push_activity(&mut self, activity: Activity) {
        if self.activity_limit == 0 {
            return;
        }
        let feed = &mut self.snapshot.recent_activity;
        feed.push_front(activity);
        feed.truncate(self.activity_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbridge_api::parse_event;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(value: &serde_json::Value) -> Event {
        parse_event(&value.to_string()).unwrap()
    }

    fn router_status(id: &str, status: &str) -> Event {
        event(&json!({
            "type": "router_status",
            "router_id": id,
            "router_name": format!("Router {id}"),
            "status": status,
            "timestamp": "2026-03-01T08:00:00Z"
        }))
    }

    fn voucher(code: &str) -> Event {
        event(&json!({
            "type": "voucher_activated",
            "voucher_id": format!("v-{code}"),
            "code": code,
            "plan_name": "Daily",
            "price": 1000,
            "timestamp": "2026-03-01T08:01:00Z"
        }))
    }

    #[test]
    fn router_status_updates_known_router() {
        let mut dash = LiveDashboard::default();
        dash.seed_routers([
            RouterSummary::new("r-1", "Lobby", "offline"),
            RouterSummary::new("r-2", "Roof", "online"),
        ]);

        dash.apply(&router_status("r-1", "online"));

        let snap = dash.snapshot();
        assert_eq!(snap.routers.len(), 2);
        assert_eq!(snap.routers[0].name, "Lobby");
        assert!(snap.routers[0].is_online());
        assert_eq!(snap.routers[0].last_seen.as_deref(), Some("2026-03-01T08:00:00Z"));
        assert!(snap.is_live);
    }

    #[test]
    fn router_status_inserts_unknown_router() {
        let mut dash = LiveDashboard::default();
        dash.apply(&router_status("r-9", "offline"));

        let snap = dash.snapshot();
        assert_eq!(snap.routers.len(), 1);
        assert_eq!(snap.routers[0].name, "Router r-9");
        assert!(!snap.routers[0].is_online());
    }

    #[test]
    fn stats_replace_counters_and_series() {
        let mut dash = LiveDashboard::default();
        dash.apply(&event(&json!({
            "type": "dashboard_stats",
            "total_routers": 4,
            "routers_online": 3,
            "active_vouchers": 27,
            "total_revenue": 540000.0,
            "today_income": 12000.0,
            "income_change": "+5%",
            "routers_change": "-1",
            "income_chart": [{ "name": "Mon", "value": 3000.0 }],
            "voucher_distribution": [{ "name": "Daily", "value": 20, "color": "#00aa88" }],
            "timestamp": "2026-03-01T08:02:00Z"
        })));

        let snap = dash.snapshot();
        assert_eq!(snap.total_routers, 4);
        assert_eq!(snap.routers_online, 3);
        assert_eq!(snap.active_vouchers, 27);
        assert_eq!(snap.income_change, "+5%");
        assert_eq!(snap.routers_change, "-1");
        assert_eq!(snap.income_chart.len(), 1);
        assert_eq!(snap.voucher_distribution[0].color, "#00aa88");
        assert!(snap.is_live);
        assert_eq!(
            snap.last_update.map(|t| t.to_rfc3339()),
            Some("2026-03-01T08:02:00+00:00".to_owned())
        );
    }

    #[test]
    fn activity_feed_is_newest_first_and_bounded() {
        let mut dash = LiveDashboard::new(3);
        for code in ["A", "B", "C", "D"] {
            dash.apply(&voucher(code));
        }

        let codes: Vec<&str> = dash
            .snapshot()
            .recent_activity
            .iter()
            .map(|a| match a {
                Activity::VoucherActivated { code, .. } => code.as_str(),
                Activity::IncomeRecorded { .. } => "income",
            })
            .collect();
        assert_eq!(codes, vec!["D", "C", "B"]);
    }

    #[test]
    fn revenue_events_do_not_mark_live() {
        let mut dash = LiveDashboard::default();
        dash.apply(&voucher("A"));
        dash.apply(&event(&json!({
            "type": "income_recorded",
            "amount": 500.0,
            "plan_name": "Hourly",
            "voucher_code": "A",
            "timestamp": "2026-03-01T08:03:00Z"
        })));

        let snap = dash.snapshot();
        assert_eq!(snap.recent_activity.len(), 2);
        assert_eq!(snap.recent_activity[0].timestamp(), "2026-03-01T08:03:00Z");
        assert!(!snap.is_live);
    }

    #[test]
    fn zero_activity_limit_keeps_nothing() {
        let mut dash = LiveDashboard::new(0);
        dash.apply(&voucher("A"));
        assert!(dash.snapshot().recent_activity.is_empty());
    }

    #[test]
    fn set_offline_reports_change_once() {
        let mut dash = LiveDashboard::default();
        assert!(!dash.set_offline());

        dash.apply(&router_status("r-1", "online"));
        assert!(dash.set_offline());
        assert!(!dash.snapshot().is_live);
        assert!(!dash.set_offline());
    }

    #[test]
    fn unparseable_timestamp_still_sets_last_update() {
        let mut dash = LiveDashboard::default();
        dash.apply(&event(&json!({
            "type": "router_status",
            "router_id": "r-1",
            "router_name": "Lobby",
            "status": "online",
            "timestamp": "yesterday"
        })));
        assert!(dash.snapshot().last_update.is_some());
    }

    #[test]
    fn snapshot_serializes_activity_with_kind_tag() {
        let mut dash = LiveDashboard::default();
        dash.apply(&voucher("A"));
        let value = serde_json::to_value(dash.snapshot()).unwrap();
        assert_eq!(value["recent_activity"][0]["kind"], "voucher_activated");
        assert_eq!(value["is_live"], false);
    }
}
