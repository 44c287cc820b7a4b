//! Typed events carried by the live stream.
//!
//! Every frame is a JSON object tagged by a `type` field. Decoding happens
//! in two steps: the frame is read as a generic [`serde_json::Value`] to
//! pull out the discriminator, then the whole payload is decoded against
//! the schema that discriminator selects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::Error;

// ── EventKind ────────────────────────────────────────────────────────

/// Wire discriminator of an [`Event`], as sent in the `type` field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    RouterStatus,
    VoucherActivated,
    IncomeRecorded,
    DashboardStats,
}

impl EventKind {
    pub const ALL: [Self; 4] = [
        Self::RouterStatus,
        Self::VoucherActivated,
        Self::IncomeRecorded,
        Self::DashboardStats,
    ];

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

// ── Event ────────────────────────────────────────────────────────────

/// A decoded event from the backend stream.
///
/// Serializes back to the wire shape (`{"type": "...", ...}`), which the
/// CLI uses for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RouterStatus(RouterStatus),
    VoucherActivated(VoucherActivated),
    IncomeRecorded(IncomeRecorded),
    DashboardStats(DashboardStats),
}

/// A router went online, offline, or changed provisioning state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterStatus {
    pub router_id: String,
    pub router_name: String,
    pub status: String,
    pub timestamp: String,
}

/// A hotspot voucher was redeemed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherActivated {
    pub voucher_id: String,
    pub code: String,
    pub plan_name: String,
    pub price: f64,
    pub timestamp: String,
}

/// Income was booked against a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeRecorded {
    pub amount: f64,
    pub plan_name: String,
    pub voucher_code: String,
    pub timestamp: String,
}

/// Periodic dashboard aggregate pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_routers: u64,
    pub routers_online: u64,
    pub active_vouchers: u64,
    pub total_revenue: f64,
    pub today_income: f64,
    /// Human-readable delta, e.g. `"+12%"`.
    pub income_change: String,
    pub routers_change: String,
    pub income_chart: Vec<ChartPoint>,
    pub voucher_distribution: Vec<VoucherShare>,
    pub timestamp: String,
}

/// One point of the income chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

/// One slice of the voucher distribution series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherShare {
    pub name: String,
    pub value: u64,
    pub color: String,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RouterStatus(_) => EventKind::RouterStatus,
            Self::VoucherActivated(_) => EventKind::VoucherActivated,
            Self::IncomeRecorded(_) => EventKind::IncomeRecorded,
            Self::DashboardStats(_) => EventKind::DashboardStats,
        }
    }

    /// Timestamp exactly as the backend sent it.
    pub fn timestamp(&self) -> &str {
        match self {
            Self::RouterStatus(e) => &e.timestamp,
            Self::VoucherActivated(e) => &e.timestamp,
            Self::IncomeRecorded(e) => &e.timestamp,
            Self::DashboardStats(e) => &e.timestamp,
        }
    }

    /// Timestamp parsed as RFC 3339, or `None` if the backend sent
    /// something else.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.timestamp())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode a single text frame into an [`Event`].
///
/// Fails with [`Error::MissingEventType`] or [`Error::UnknownEventType`]
/// when the discriminator is absent or unrecognised, and with
/// [`Error::Deserialization`] when the frame is not JSON or its payload
/// does not match the schema for its discriminator.
pub fn parse_event(text: &str) -> Result<Event, Error> {
    let value: Value = serde_json::from_str(text).map_err(|e| deserialization(&e, text))?;

    let kind = match value.get("type") {
        Some(Value::String(tag)) => tag
            .parse::<EventKind>()
            .map_err(|_| Error::UnknownEventType(tag.clone()))?,
        Some(other) => return Err(Error::UnknownEventType(other.to_string())),
        None => return Err(Error::MissingEventType),
    };

    let event = match kind {
        EventKind::RouterStatus => serde_json::from_value(value).map(Event::RouterStatus),
        EventKind::VoucherActivated => serde_json::from_value(value).map(Event::VoucherActivated),
        EventKind::IncomeRecorded => serde_json::from_value(value).map(Event::IncomeRecorded),
        EventKind::DashboardStats => serde_json::from_value(value).map(Event::DashboardStats),
    };

    event.map_err(|e| deserialization(&e, text))
}

fn deserialization(err: &serde_json::Error, body: &str) -> Error {
    Error::Deserialization {
        message: err.to_string(),
        body: body.to_owned(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
