use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

use crate::aggregation::report::DateRange;

/// Dimension a report can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    PagePath,
    PageTitle,
    DeviceCategory,
    Country,
}

/// Metric a report can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    ScreenPageViews,
    TotalUsers,
    /// Seconds.
    AverageSessionDuration,
    /// Fraction of sessions in `[0, 1]`.
    BounceRate,
    ActiveUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub metric: Metric,
    pub desc: bool,
}

impl OrderBy {
    pub fn desc(metric: Metric) -> Self {
        Self { metric, desc: true }
    }
}

/// One report query against a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub property: String,
    pub date_range: DateRange,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl ReportRequest {
    pub fn new(property: &str, date_range: DateRange, metrics: Vec<Metric>) -> Self {
        Self {
            property: property.to_string(),
            date_range,
            dimensions: Vec::new(),
            metrics,
            order_by: None,
            limit: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One result row. Values are strings, in the order of the request's
/// dimensions and metrics, as reporting APIs return them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub dimension_values: Vec<String>,
    pub metric_values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub rows: Vec<ReportRow>,
}

/// Interface to an analytics reporting backend. A hosted API is one
/// implementation; the event store is another.
pub trait ReportingApi {
    type Error: Display + Debug;

    /// Runs a historical report over the request's date range.
    fn run_report(
        &self,
        request: &ReportRequest,
    ) -> Result<ReportResponse, Self::Error>;

    /// Runs a report over the last few minutes of activity.
    fn run_realtime_report(
        &self,
        property: &str,
        metrics: &[Metric],
    ) -> Result<ReportResponse, Self::Error>;
}
