use std::str::FromStr;

use crate::{
    aggregation::{
        report::{
            AnalyticsOverview, BasicMetrics, DateRange, DeviceBreakdown, GeoData,
            TopPage,
        },
        traits::{
            Dimension, Metric, OrderBy, ReportRequest, ReportResponse, ReportRow,
            ReportingApi,
        },
    },
    error::AggregationServiceError,
};

pub const DEFAULT_TOP_PAGES_LIMIT: usize = 10;
pub const DEFAULT_GEO_LIMIT: usize = 10;

/// Answers dashboard queries for one property on top of a reporting API.
///
/// Every failure is an [`AggregationServiceError`] carrying the property:
/// missing or unparsable values are errors, never zeros.
#[derive(Debug)]
pub struct AggregationService<R: ReportingApi> {
    pub api: R,
    property_id: String,
}

impl<R: ReportingApi> AggregationService<R> {
    pub fn with_property_id(
        api: R,
        property_id: &str,
    ) -> Result<Self, AggregationServiceError> {
        let property_id = property_id.trim();
        if property_id.is_empty() {
            return Err(AggregationServiceError::MissingPropertyId);
        }
        Ok(Self {
            api,
            property_id: property_id.to_string(),
        })
    }

    pub fn property_id(&self) -> &str {
        &self.property_id
    }

    pub fn get_basic_metrics(
        &self,
        date_range: &DateRange,
    ) -> Result<BasicMetrics, AggregationServiceError> {
        let request = ReportRequest::new(
            &self.property_id,
            date_range.clone(),
            vec![
                Metric::ScreenPageViews,
                Metric::TotalUsers,
                Metric::AverageSessionDuration,
                Metric::BounceRate,
            ],
        );
        let response = self.run(&request)?;

        // No rows means no traffic in the range.
        let Some(row) = response.rows.first() else {
            return Ok(BasicMetrics::default());
        };
        Ok(BasicMetrics {
            page_views: self.metric(row, 0)?,
            unique_visitors: self.metric(row, 1)?,
            session_duration: self.metric(row, 2)?,
            bounce_rate: self.metric(row, 3)?,
        })
    }

    pub fn get_top_pages(
        &self,
        date_range: &DateRange,
        limit: usize,
    ) -> Result<Vec<TopPage>, AggregationServiceError> {
        let request = ReportRequest::new(
            &self.property_id,
            date_range.clone(),
            vec![Metric::ScreenPageViews],
        )
        .with_dimensions(vec![Dimension::PagePath, Dimension::PageTitle])
        .with_order_by(OrderBy::desc(Metric::ScreenPageViews))
        .with_limit(limit);

        self.run(&request)?
            .rows
            .iter()
            .map(|row| {
                let title = self.dimension(row, 1)?;
                Ok(TopPage {
                    path: self.dimension(row, 0)?.to_string(),
                    views: self.metric(row, 0)?,
                    title: (!title.is_empty()).then(|| title.to_string()),
                })
            })
            .collect()
    }

    pub fn get_device_breakdown(
        &self,
        date_range: &DateRange,
    ) -> Result<DeviceBreakdown, AggregationServiceError> {
        let request = ReportRequest::new(
            &self.property_id,
            date_range.clone(),
            vec![Metric::TotalUsers],
        )
        .with_dimensions(vec![Dimension::DeviceCategory]);

        let mut breakdown = DeviceBreakdown::default();
        for row in &self.run(&request)?.rows {
            let users = self.metric(row, 0)?;
            match self.dimension(row, 0)?.to_ascii_lowercase().as_str() {
                "desktop" => breakdown.desktop = users,
                "mobile" => breakdown.mobile = users,
                "tablet" => breakdown.tablet = users,
                // smart tv, console, ...
                _ => {}
            }
        }
        Ok(breakdown)
    }

    pub fn get_geo_data(
        &self,
        date_range: &DateRange,
        limit: usize,
    ) -> Result<Vec<GeoData>, AggregationServiceError> {
        let request = ReportRequest::new(
            &self.property_id,
            date_range.clone(),
            vec![Metric::TotalUsers],
        )
        .with_dimensions(vec![Dimension::Country])
        .with_order_by(OrderBy::desc(Metric::TotalUsers))
        .with_limit(limit);

        self.run(&request)?
            .rows
            .iter()
            .map(|row| {
                Ok(GeoData {
                    country: self.dimension(row, 0)?.to_string(),
                    users: self.metric(row, 0)?,
                })
            })
            .collect()
    }

    /// Active users right now, reported as unique visitors. The other
    /// fields are not available in realtime and stay zero.
    pub fn get_realtime_data(&self) -> Result<BasicMetrics, AggregationServiceError> {
        let response = self
            .api
            .run_realtime_report(&self.property_id, &[Metric::ActiveUsers])
            .map_err(|e| self.upstream(e))?;
        let active_users = match response.rows.first() {
            Some(row) => self.metric(row, 0)?,
            None => 0,
        };
        Ok(BasicMetrics {
            unique_visitors: active_users,
            ..BasicMetrics::default()
        })
    }

    /// Runs a small query to check that the backend answers for this
    /// property.
    pub fn test_connection(&self) -> bool {
        match self.get_basic_metrics(&DateRange::default()) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("analytics connection test failed: {e}");
                false
            }
        }
    }

    /// All dashboard sections for `date_range`. Fails as a whole if any
    /// section fails.
    pub fn fetch_overview(
        &self,
        date_range: &DateRange,
    ) -> Result<AnalyticsOverview, AggregationServiceError> {
        Ok(AnalyticsOverview {
            property_id: self.property_id.clone(),
            date_range: date_range.clone(),
            metrics: self.get_basic_metrics(date_range)?,
            top_pages: self.get_top_pages(date_range, DEFAULT_TOP_PAGES_LIMIT)?,
            device_breakdown: self.get_device_breakdown(date_range)?,
            geo_data: self.get_geo_data(date_range, DEFAULT_GEO_LIMIT)?,
        })
    }

    fn run(
        &self,
        request: &ReportRequest,
    ) -> Result<ReportResponse, AggregationServiceError> {
        self.api.run_report(request).map_err(|e| self.upstream(e))
    }

    fn upstream(&self, error: R::Error) -> AggregationServiceError {
        AggregationServiceError::Upstream {
            property_id: self.property_id.clone(),
            message: error.to_string(),
        }
    }

    fn malformed(&self, message: String) -> AggregationServiceError {
        AggregationServiceError::MalformedReport {
            property_id: self.property_id.clone(),
            message,
        }
    }

    fn dimension<'r>(
        &self,
        row: &'r ReportRow,
        index: usize,
    ) -> Result<&'r str, AggregationServiceError> {
        row.dimension_values
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.malformed(format!("missing dimension #{index}")))
    }

    fn metric<T: FromStr>(
        &self,
        row: &ReportRow,
        index: usize,
    ) -> Result<T, AggregationServiceError> {
        let value = row
            .metric_values
            .get(index)
            .ok_or_else(|| self.malformed(format!("missing metric #{index}")))?;
        value
            .parse()
            .map_err(|_| self.malformed(format!("metric #{index} is not a number: {value:?}")))
    }
}
