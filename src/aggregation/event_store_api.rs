use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use anyhow::Context;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};

use crate::{
    aggregation::traits::{
        Dimension, Metric, ReportRequest, ReportResponse, ReportRow,
        ReportingApi,
    },
    clock::Clock,
    events::{
        selectors::TimeWindowSelector,
        traits::EventStorage,
        tracking_event::{EventType, TrackingEvent},
    },
};

/// Window covered by a realtime report.
pub const REALTIME_WINDOW_MINUTES: i64 = 30;

const COUNTRY_NOT_SET: &str = "(not set)";

/// Reporting backend answering queries from collected events. The property
/// is the tracked domain.
pub struct EventStoreReportingApi<'a, ES, C> {
    storage: &'a ES,
    clock: &'a C,
}

impl<'a, ES, C> EventStoreReportingApi<'a, ES, C>
where
    ES: EventStorage<RelevantEventSelector = TimeWindowSelector>,
    ES::Error: Into<anyhow::Error>,
    C: Clock,
{
    pub fn new(storage: &'a ES, clock: &'a C) -> Self {
        Self { storage, clock }
    }

    fn events_between(
        &self,
        domain: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TrackingEvent>, anyhow::Error> {
        let selector = TimeWindowSelector::new(start, end);
        let events = self
            .storage
            .get_relevant_events(domain, &selector)
            .map_err(|e| -> anyhow::Error { e.into() })
            .with_context(|| format!("failed to read events for {domain}"))?;
        Ok(events.unwrap_or_default())
    }
}

impl<ES, C> ReportingApi for EventStoreReportingApi<'_, ES, C>
where
    ES: EventStorage<RelevantEventSelector = TimeWindowSelector>,
    ES::Error: Into<anyhow::Error>,
    C: Clock,
{
    type Error = anyhow::Error;

    fn run_report(
        &self,
        request: &ReportRequest,
    ) -> Result<ReportResponse, Self::Error> {
        let (start, end) = request.date_range.resolve(self.clock.today())?;
        let end = end
            .checked_add_days(Days::new(1))
            .context("date range end out of bounds")?;
        let events = self.events_between(
            &request.property,
            start_of_day(start),
            start_of_day(end),
        )?;
        Ok(build_report(&events, request))
    }

    fn run_realtime_report(
        &self,
        property: &str,
        metrics: &[Metric],
    ) -> Result<ReportResponse, Self::Error> {
        let now = self.clock.now();
        let events = self.events_between(
            property,
            now - Duration::minutes(REALTIME_WINDOW_MINUTES),
            now + Duration::milliseconds(1),
        )?;
        let request = ReportRequest {
            property: property.to_string(),
            date_range: Default::default(),
            dimensions: Vec::new(),
            metrics: metrics.to_vec(),
            order_by: None,
            limit: None,
        };
        Ok(build_report(&events, &request))
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(Default::default()).and_utc()
}

fn dimension_value(event: &TrackingEvent, dimension: Dimension) -> String {
    match dimension {
        Dimension::PagePath => event.page_path().to_string(),
        Dimension::PageTitle => event.page_title.clone(),
        Dimension::DeviceCategory => {
            event.context.device_category().as_str().to_string()
        }
        Dimension::Country => event
            .context
            .country_code()
            .unwrap_or_else(|| COUNTRY_NOT_SET.to_string()),
    }
}

/// Groups `events` by the requested dimensions and computes every metric
/// per group. Rows whose metrics are all zero are omitted.
fn build_report(events: &[TrackingEvent], request: &ReportRequest) -> ReportResponse {
    let mut groups: BTreeMap<Vec<String>, Vec<&TrackingEvent>> = BTreeMap::new();
    for event in events {
        let key = request
            .dimensions
            .iter()
            .map(|dimension| dimension_value(event, *dimension))
            .collect();
        groups.entry(key).or_default().push(event);
    }

    let mut rows: Vec<(Vec<f64>, ReportRow)> = groups
        .into_iter()
        .filter_map(|(dimension_values, events)| {
            let values: Vec<f64> = request
                .metrics
                .iter()
                .map(|metric| metric_value(*metric, &events))
                .collect();
            if values.iter().all(|value| *value == 0.0) {
                return None;
            }
            let metric_values = request
                .metrics
                .iter()
                .zip(&values)
                .map(|(metric, value)| format_metric(*metric, *value))
                .collect();
            Some((
                values,
                ReportRow {
                    dimension_values,
                    metric_values,
                },
            ))
        })
        .collect();

    if let Some(order_by) = request.order_by {
        if let Some(index) = request.metrics.iter().position(|m| *m == order_by.metric)
        {
            rows.sort_by(|(a, _), (b, _)| {
                let ordering = a[index].partial_cmp(&b[index]).unwrap_or(Ordering::Equal);
                if order_by.desc {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
    }
    if let Some(limit) = request.limit {
        rows.truncate(limit);
    }

    ReportResponse {
        rows: rows.into_iter().map(|(_, row)| row).collect(),
    }
}

fn format_metric(metric: Metric, value: f64) -> String {
    match metric {
        Metric::ScreenPageViews | Metric::TotalUsers | Metric::ActiveUsers => {
            format!("{}", value as u64)
        }
        Metric::AverageSessionDuration | Metric::BounceRate => value.to_string(),
    }
}

fn metric_value(metric: Metric, events: &[&TrackingEvent]) -> f64 {
    match metric {
        Metric::ScreenPageViews => events
            .iter()
            .filter(|event| event.event_type == EventType::Pageview)
            .count() as f64,
        Metric::TotalUsers | Metric::ActiveUsers => events
            .iter()
            .map(|event| event.user_id.as_str())
            .filter(|user_id| !user_id.is_empty())
            .collect::<BTreeSet<_>>()
            .len() as f64,
        Metric::AverageSessionDuration => {
            let sessions = summarize_sessions(events);
            if sessions.is_empty() {
                return 0.0;
            }
            let total: f64 = sessions.values().map(SessionSummary::duration_secs).sum();
            total / sessions.len() as f64
        }
        Metric::BounceRate => {
            let sessions = summarize_sessions(events);
            if sessions.is_empty() {
                return 0.0;
            }
            let bounced = sessions.values().filter(|s| s.bounced()).count();
            bounced as f64 / sessions.len() as f64
        }
    }
}

#[derive(Debug)]
struct SessionSummary {
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    page_views: usize,
    interacted: bool,
    engaged: bool,
}

impl SessionSummary {
    fn new(event: &TrackingEvent) -> Self {
        Self {
            first: event.timestamp,
            last: event.timestamp,
            page_views: 0,
            interacted: false,
            engaged: false,
        }
    }

    fn record(&mut self, event: &TrackingEvent) {
        self.first = self.first.min(event.timestamp);
        self.last = self.last.max(event.timestamp);
        match event.event_type {
            EventType::Pageview => self.page_views += 1,
            EventType::TimeOnPage => {
                if event.data("engaged").and_then(|v| v.as_bool()) == Some(true) {
                    self.engaged = true;
                }
            }
            event_type if event_type.is_interaction() => self.interacted = true,
            _ => {}
        }
    }

    fn duration_secs(&self) -> f64 {
        (self.last - self.first).num_milliseconds() as f64 / 1000.0
    }

    /// At most one page view and no sign of engagement.
    fn bounced(&self) -> bool {
        self.page_views <= 1 && !self.interacted && !self.engaged
    }
}

fn summarize_sessions<'e>(
    events: &[&'e TrackingEvent],
) -> BTreeMap<&'e str, SessionSummary> {
    let mut sessions: BTreeMap<&str, SessionSummary> = BTreeMap::new();
    for event in events.iter().copied() {
        if event.session_id.is_empty() {
            continue;
        }
        sessions
            .entry(event.session_id.as_str())
            .or_insert_with(|| SessionSummary::new(event))
            .record(event);
    }
    sessions
}
