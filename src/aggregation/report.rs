use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AggregationServiceError;

pub const DEFAULT_START_DATE: &str = "7daysAgo";
pub const DEFAULT_END_DATE: &str = "today";

/// Inclusive date range. Bounds are either `YYYY-MM-DD` or relative:
/// `today`, `yesterday`, `NdaysAgo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new(DEFAULT_START_DATE, DEFAULT_END_DATE)
    }
}

impl DateRange {
    pub fn new(start_date: &str, end_date: &str) -> Self {
        Self {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
        }
    }

    /// Resolves both bounds against `today`.
    pub fn resolve(
        &self,
        today: NaiveDate,
    ) -> Result<(NaiveDate, NaiveDate), AggregationServiceError> {
        let start = parse_date(&self.start_date, today)?;
        let end = parse_date(&self.end_date, today)?;
        if start > end {
            return Err(AggregationServiceError::InvalidDateRange(format!(
                "{} is after {}",
                self.start_date, self.end_date
            )));
        }
        Ok((start, end))
    }
}

/// Parses one date bound.
pub fn parse_date(
    value: &str,
    today: NaiveDate,
) -> Result<NaiveDate, AggregationServiceError> {
    let invalid =
        || AggregationServiceError::InvalidDateRange(format!("unrecognized date {value:?}"));

    let days_ago = match value {
        "today" => Some(0),
        "yesterday" => Some(1),
        _ => match value.strip_suffix("daysAgo") {
            Some(n) => Some(n.parse::<u64>().map_err(|_| invalid())?),
            None => None,
        },
    };

    match days_ago {
        Some(days) => today.checked_sub_days(Days::new(days)).ok_or_else(invalid),
        None => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid()),
    }
}

/// Headline numbers for a date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicMetrics {
    pub page_views: u64,
    pub unique_visitors: u64,
    /// Average session duration in seconds.
    pub session_duration: f64,
    pub bounce_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPage {
    pub path: String,
    pub views: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Users per device category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBreakdown {
    pub desktop: u64,
    pub mobile: u64,
    pub tablet: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoData {
    pub country: String,
    pub users: u64,
}

/// Everything the dashboard shows for one property and date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub property_id: String,
    pub date_range: DateRange,
    pub metrics: BasicMetrics,
    pub top_pages: Vec<TopPage>,
    pub device_breakdown: DeviceBreakdown,
    pub geo_data: Vec<GeoData>,
}
