use crate::application::event_source::CalendarEventSource;
use crate::application::report::render_report;
use crate::domain::attendance::filter_attended;
use crate::domain::color_filter::{ColorFilter, ColorFilterSummary};
use crate::domain::color_palette::ColorPalette;
use crate::domain::models::AnalysisPeriod;
use crate::domain::time_aggregator::{AnalysisSummary, ColorBreakdown, TimeAggregator};
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColorAnalysisReport {
    pub period: AnalysisPeriod,
    pub color_filter_summary: ColorFilterSummary,
    pub color_breakdown: ColorBreakdown,
    pub summary: AnalysisSummary,
    pub formatted_text: String,
}

/// Fetch, attendance filter, color filter, aggregate, render.
pub struct ColorAnalysisService {
    event_source: Arc<dyn CalendarEventSource>,
    palette: ColorPalette,
}

impl ColorAnalysisService {
    pub fn new(event_source: Arc<dyn CalendarEventSource>, palette: ColorPalette) -> Self {
        Self {
            event_source,
            palette,
        }
    }

    pub async fn analyze(
        &self,
        period: AnalysisPeriod,
        filter: &ColorFilter,
    ) -> Result<ColorAnalysisReport, InfraError> {
        let events = self.event_source.fetch_events(period.start, period.end).await?;
        let fetched = events.len();
        let user_email = self.event_source.current_user_email().await?;

        let attended = filter_attended(events, user_email.as_deref());
        let attended_count = attended.len();
        let kept = filter.apply(attended);

        let analysis = TimeAggregator::new(self.palette).analyze(&kept);
        let color_filter_summary = filter.summary();
        let formatted_text = render_report(
            &period,
            &color_filter_summary,
            &analysis,
            self.palette.locale(),
        );

        info!(
            start = %period.start,
            end = %period.end,
            fetched,
            attended = attended_count,
            analyzed = kept.len(),
            colors = analysis.color_breakdown.len(),
            "color time analysis complete"
        );

        Ok(ColorAnalysisReport {
            period,
            color_filter_summary,
            color_breakdown: analysis.color_breakdown,
            summary: analysis.summary,
            formatted_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::color_palette::{ColorInput, Locale};
    use crate::domain::models::{Attendee, CalendarEvent, EventTime, Organizer, ResponseStatus};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeEventSource {
        events: Vec<CalendarEvent>,
        email: Option<String>,
        requires_auth: bool,
        email_calls: AtomicUsize,
    }

    #[async_trait]
    impl CalendarEventSource for FakeEventSource {
        async fn fetch_events(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<CalendarEvent>, InfraError> {
            if self.requires_auth {
                return Err(InfraError::AuthenticationRequired("no token".to_string()));
            }
            Ok(self.events.clone())
        }

        async fn current_user_email(&self) -> Result<Option<String>, InfraError> {
            self.email_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.email.clone())
        }
    }

    fn timed(title: &str, color_id: Option<i64>, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            title: Some(title.to_string()),
            color_id,
            start: EventTime::timed(DateTime::parse_from_rfc3339(start).expect("start")),
            end: EventTime::timed(DateTime::parse_from_rfc3339(end).expect("end")),
            ..Default::default()
        }
    }

    fn with_my_response(mut event: CalendarEvent, status: ResponseStatus) -> CalendarEvent {
        event.attendees = vec![
            Attendee {
                email: "Me@Example.com".to_string(),
                response_status: status,
                is_self: false,
            },
            Attendee {
                email: "boss@example.com".to_string(),
                response_status: ResponseStatus::Accepted,
                is_self: false,
            },
        ];
        event.organizer = Some(Organizer {
            email: "boss@example.com".to_string(),
            display_name: None,
            is_self: false,
        });
        event
    }

    fn service(source: FakeEventSource) -> (ColorAnalysisService, Arc<FakeEventSource>) {
        let source = Arc::new(source);
        let service = ColorAnalysisService::new(
            Arc::clone(&source) as Arc<dyn CalendarEventSource>,
            ColorPalette::new(Locale::En),
        );
        (service, source)
    }

    fn period() -> AnalysisPeriod {
        AnalysisPeriod::parse("2025-01-06", "2025-01-12").expect("period")
    }

    fn week_of_events() -> Vec<CalendarEvent> {
        vec![
            timed("Deep work", Some(2), "2025-01-06T09:00:00Z", "2025-01-06T11:00:00Z"),
            with_my_response(
                timed("Planning", Some(3), "2025-01-07T09:00:00Z", "2025-01-07T10:30:00Z"),
                ResponseStatus::Accepted,
            ),
            with_my_response(
                timed("Skipped", Some(3), "2025-01-08T09:00:00Z", "2025-01-08T10:00:00Z"),
                ResponseStatus::Declined,
            ),
            timed("Default colored", None, "2025-01-09T09:00:00Z", "2025-01-09T09:30:00Z"),
        ]
    }

    #[tokio::test]
    async fn pipeline_drops_unattended_events_and_groups_by_color() {
        let (service, source) = service(FakeEventSource {
            events: week_of_events(),
            email: Some("me@example.com".to_string()),
            ..FakeEventSource::default()
        });

        let report = service
            .analyze(period(), &ColorFilter::none(ColorPalette::new(Locale::En)))
            .await
            .expect("analysis");

        assert_eq!(report.period.days, 7);
        assert!(!report.color_filter_summary.has_filters);
        assert_eq!(report.summary.total_events, 3);
        assert_eq!(report.summary.total_hours, 4.0);
        let names: Vec<&str> = report
            .color_breakdown
            .groups()
            .iter()
            .map(|group| group.color_name.as_str())
            .collect();
        assert_eq!(names, vec!["Sage", "Grape", "Blueberry"]);
        assert!(report.formatted_text.contains("■ Sage: 2h 0m (1 event)"));
        assert_eq!(source.email_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn color_filter_applies_after_attendance() {
        let (service, _) = service(FakeEventSource {
            events: week_of_events(),
            email: Some("me@example.com".to_string()),
            ..FakeEventSource::default()
        });
        let palette = ColorPalette::new(Locale::En);
        let include = [ColorInput::Text("Grape".to_string()), ColorInput::Integer(9)];
        let filter = ColorFilter::new(palette, Some(&include), None).expect("filter");

        let report = service.analyze(period(), &filter).await.expect("analysis");

        assert_eq!(report.summary.total_events, 2);
        assert_eq!(
            report.color_filter_summary.include_colors.as_deref(),
            Some("Grape(3), Blueberry(9)")
        );
        let most_used = report.summary.most_used_color.expect("most used");
        assert_eq!(most_used.name, "Grape");
        assert_eq!(most_used.percentage, 75.0);
    }

    #[tokio::test]
    async fn authentication_failure_stops_before_email_lookup() {
        let (service, source) = service(FakeEventSource {
            requires_auth: true,
            ..FakeEventSource::default()
        });
        let result = service
            .analyze(period(), &ColorFilter::none(ColorPalette::new(Locale::En)))
            .await;
        assert!(matches!(result, Err(InfraError::AuthenticationRequired(_))));
        assert_eq!(source.email_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_period_serializes_without_most_used_color() {
        let (service, _) = service(FakeEventSource::default());
        let report = service
            .analyze(period(), &ColorFilter::none(ColorPalette::new(Locale::En)))
            .await
            .expect("analysis");

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["color_breakdown"], serde_json::json!({}));
        assert_eq!(json["summary"]["total_events"], 0);
        assert!(json["summary"].get("most_used_color").is_none());
        assert_eq!(json["period"]["start"], "2025-01-06");
    }
}
