use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Timelike, Utc};
use relay_core::{CoreError, CoreResult};
use relay_shared::{DeliveryStatus, DeliverySummary};

use crate::models::{CourierReport, DayStats, ReportDelivery, ReportSummary};
use crate::status::status_token;

/// Longest period a single report may cover
const MAX_REPORT_DAYS: i64 = 366;
const HOURS_PER_SLOT: u32 = 4;
const LAST_SLOT: u32 = 5;
const DAY_NAMES: [&str; 7] = ["sunday", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday"];

/// Inclusive report period in UTC, from 00:00:00.000 on the first day to
/// 23:59:59.999 on the last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportRange {
    /// The given days when both are present, otherwise the Sunday to
    /// Saturday week containing `today`
    pub fn resolve(first: Option<NaiveDate>, last: Option<NaiveDate>, today: NaiveDate) -> CoreResult<Self> {
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                let sunday = today - Days::new(u64::from(today.weekday().num_days_from_sunday()));
                (sunday, sunday + Days::new(6))
            }
        };

        if first > last {
            return Err(CoreError::invalid("start_date must not be after end_date"));
        }
        if last.signed_duration_since(first).num_days() >= MAX_REPORT_DAYS {
            return Err(CoreError::invalid(format!(
                "a report covers at most {} days",
                MAX_REPORT_DAYS
            )));
        }

        let start = first
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CoreError::invalid("invalid start_date"))?;
        let end = last
            .and_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| CoreError::invalid("invalid end_date"))?;

        Ok(Self {
            start: Utc.from_utc_datetime(&start),
            end: Utc.from_utc_datetime(&end),
        })
    }
}

impl DayStats {
    fn empty(day: &str) -> Self {
        Self {
            day_of_week: day.to_string(),
            hourly_data: [0; 6],
            total_deliveries: 0,
            completed_deliveries: 0,
            pending_deliveries: 0,
            cancelled_deliveries: 0,
        }
    }
}

/// Bucket the courier's deliveries in `range` (newest first) by weekday
/// and four-hour slot of their creation time
pub fn build_report(range: ReportRange, rows: &[DeliverySummary]) -> CourierReport {
    let mut weekly_stats: Vec<DayStats> = DAY_NAMES.iter().map(|day| DayStats::empty(day)).collect();
    let mut summary = ReportSummary::default();
    let mut deliveries = Vec::with_capacity(rows.len());

    for row in rows {
        let delivery = &row.delivery;
        let weekday = delivery.created_at.weekday().num_days_from_sunday() as usize;
        let slot = (delivery.created_at.hour() / HOURS_PER_SLOT).min(LAST_SLOT) as usize;
        let day = &mut weekly_stats[weekday];

        day.hourly_data[slot] += 1;
        day.total_deliveries += 1;
        summary.total_deliveries += 1;
        match delivery.status {
            DeliveryStatus::Completed => {
                day.completed_deliveries += 1;
                summary.completed_deliveries += 1;
                summary.total_earnings += delivery.price;
            }
            DeliveryStatus::Canceled => {
                day.cancelled_deliveries += 1;
                summary.cancelled_deliveries += 1;
            }
            DeliveryStatus::Pending | DeliveryStatus::InProgress => {
                day.pending_deliveries += 1;
                summary.pending_deliveries += 1;
            }
        }

        deliveries.push(ReportDelivery {
            id: delivery.id,
            code: delivery.code.clone(),
            status: status_token(delivery.status).to_string(),
            day: DAY_NAMES[weekday].to_string(),
            customer_name: row.company_name.clone(),
            address: row.destination.parts.display_line(),
            value: delivery.price,
            created_at: delivery.created_at,
            delivered_at: delivery.completed_at,
            description: delivery.package.information.clone(),
        });
    }

    CourierReport {
        start: range.start,
        end: range.end,
        weekly_stats,
        summary,
        deliveries,
    }
}
