use crate::domain::color_filter::ColorFilterSummary;
use crate::domain::color_palette::Locale;
use crate::domain::models::AnalysisPeriod;
use crate::domain::time_aggregator::{ColorGroup, ColorTimeAnalysis};
use std::fmt::Write;

const LISTED_TITLES: usize = 3;

struct Labels {
    header: &'static str,
    range_separator: &'static str,
    include: &'static str,
    exclude: &'static str,
    no_events: &'static str,
    summary: &'static str,
    total: &'static str,
    most_used: &'static str,
}

const ENGLISH: Labels = Labels {
    header: "Color time analysis",
    range_separator: " to ",
    include: "Included colors",
    exclude: "Excluded colors",
    no_events: "No events found in this period.",
    summary: "Summary",
    total: "Total",
    most_used: "Most used",
};

const JAPANESE: Labels = Labels {
    header: "色別時間分析",
    range_separator: " 〜 ",
    include: "対象の色",
    exclude: "除外した色",
    no_events: "この期間に予定はありません。",
    summary: "サマリー",
    total: "合計",
    most_used: "最も多い色",
};

fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::En => &ENGLISH,
        Locale::Ja => &JAPANESE,
    }
}

/// Plain-text rendering of an analysis, built only from its inputs.
pub fn render_report(
    period: &AnalysisPeriod,
    filter: &ColorFilterSummary,
    analysis: &ColorTimeAnalysis,
    locale: Locale,
) -> String {
    let labels = labels(locale);
    let mut text = String::new();

    let _ = writeln!(
        text,
        "{}: {}{}{} ({})",
        labels.header,
        period.start,
        labels.range_separator,
        period.end,
        day_count(period.days, locale)
    );
    if let Some(include) = filter.include_colors.as_deref() {
        let _ = writeln!(text, "{}: {include}", labels.include);
    }
    if let Some(exclude) = filter.exclude_colors.as_deref() {
        let _ = writeln!(text, "{}: {exclude}", labels.exclude);
    }
    text.push('\n');

    if analysis.color_breakdown.is_empty() {
        text.push_str(labels.no_events);
        return text;
    }

    for group in analysis.color_breakdown.groups() {
        render_group(&mut text, group, locale);
    }

    let summary = &analysis.summary;
    let _ = writeln!(text, "{}", labels.summary);
    let _ = writeln!(
        text,
        "  {}: {} / {}",
        labels.total,
        format_hours(summary.total_hours, locale),
        event_count(summary.total_events, locale)
    );
    if let Some(most_used) = &summary.most_used_color {
        let _ = writeln!(
            text,
            "  {}: {} ({}, {}%)",
            labels.most_used,
            most_used.name,
            format_hours(most_used.hours, locale),
            most_used.percentage
        );
    }

    text.truncate(text.trim_end().len());
    text
}

fn render_group(text: &mut String, group: &ColorGroup, locale: Locale) {
    let _ = writeln!(
        text,
        "■ {}: {} ({})",
        group.color_name,
        format_hours(group.total_hours, locale),
        event_count(group.event_count, locale)
    );

    let titles: Vec<&str> = group
        .events
        .iter()
        .take(LISTED_TITLES)
        .map(|event| event.title.as_str())
        .collect();
    if titles.is_empty() {
        text.push('\n');
        return;
    }
    let hidden = group.events.len().saturating_sub(LISTED_TITLES);
    let more = match (hidden, locale) {
        (0, _) => String::new(),
        (count, Locale::En) => format!(" (+{count} more)"),
        (count, Locale::Ja) => format!(" (他{count}件)"),
    };
    let _ = writeln!(text, "  {}{more}", titles.join(", "));
    text.push('\n');
}

/// `1h 30m` or `1時間30分`, rounded to the nearest minute.
pub fn format_hours(hours: f64, locale: Locale) -> String {
    let total_minutes = (hours * 60.0).round() as i64;
    let sign = if total_minutes < 0 { "-" } else { "" };
    let total_minutes = total_minutes.abs();
    let (whole_hours, minutes) = (total_minutes / 60, total_minutes % 60);
    match locale {
        Locale::En => format!("{sign}{whole_hours}h {minutes}m"),
        Locale::Ja => format!("{sign}{whole_hours}時間{minutes}分"),
    }
}

fn event_count(count: usize, locale: Locale) -> String {
    match (locale, count) {
        (Locale::En, 1) => "1 event".to_string(),
        (Locale::En, count) => format!("{count} events"),
        (Locale::Ja, count) => format!("{count}件"),
    }
}

fn day_count(days: i64, locale: Locale) -> String {
    match (locale, days) {
        (Locale::En, 1) => "1 day".to_string(),
        (Locale::En, days) => format!("{days} days"),
        (Locale::Ja, days) => format!("{days}日間"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::color_palette::ColorPalette;
    use crate::domain::models::{CalendarEvent, EventTime};
    use crate::domain::time_aggregator::TimeAggregator;
    use chrono::DateTime;

    fn event(title: &str, color_id: i64, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            title: Some(title.to_string()),
            color_id: Some(color_id),
            start: EventTime::timed(DateTime::parse_from_rfc3339(start).expect("start")),
            end: EventTime::timed(DateTime::parse_from_rfc3339(end).expect("end")),
            ..Default::default()
        }
    }

    fn sample_events() -> Vec<CalendarEvent> {
        vec![
            event("Design", 3, "2025-01-06T09:00:00Z", "2025-01-06T11:30:00Z"),
            event("Review", 3, "2025-01-07T09:00:00Z", "2025-01-07T10:00:00Z"),
            event("Sync", 3, "2025-01-08T09:00:00Z", "2025-01-08T09:30:00Z"),
            event("Retro", 3, "2025-01-09T09:00:00Z", "2025-01-09T10:00:00Z"),
            event("Lunch", 5, "2025-01-06T12:00:00Z", "2025-01-06T13:00:00Z"),
        ]
    }

    fn period() -> AnalysisPeriod {
        AnalysisPeriod::parse("2025-01-06", "2025-01-12").expect("period")
    }

    fn no_filter() -> ColorFilterSummary {
        ColorFilterSummary {
            include_colors: None,
            exclude_colors: None,
            has_filters: false,
        }
    }

    #[test]
    fn hours_render_per_locale() {
        assert_eq!(format_hours(1.5, Locale::En), "1h 30m");
        assert_eq!(format_hours(0.0, Locale::En), "0h 0m");
        assert_eq!(format_hours(2.5427, Locale::Ja), "2時間33分");
        assert_eq!(format_hours(24.0, Locale::Ja), "24時間0分");
    }

    #[test]
    fn english_report_lists_groups_and_summary() {
        let analysis = TimeAggregator::new(ColorPalette::new(Locale::En)).analyze(&sample_events());
        let text = render_report(&period(), &no_filter(), &analysis, Locale::En);

        assert!(text.starts_with("Color time analysis: 2025-01-06 to 2025-01-12 (7 days)\n"));
        assert!(text.contains("■ Grape: 5h 0m (4 events)\n  Design, Review, Sync (+1 more)"));
        assert!(text.contains("■ Banana: 1h 0m (1 event)\n  Lunch"));
        assert!(text.contains("  Total: 6h 0m / 5 events"));
        assert!(text.ends_with("  Most used: Grape (5h 0m, 83.3%)"));
        assert!(text.find("Grape").expect("grape") < text.find("Banana").expect("banana"));
    }

    #[test]
    fn japanese_report_uses_japanese_units() {
        let analysis = TimeAggregator::new(ColorPalette::new(Locale::Ja)).analyze(&sample_events());
        let filter = ColorFilterSummary {
            include_colors: Some("紫(3), 黄(5)".to_string()),
            exclude_colors: None,
            has_filters: true,
        };
        let text = render_report(&period(), &filter, &analysis, Locale::Ja);

        assert!(text.contains("(7日間)"));
        assert!(text.contains("対象の色: 紫(3), 黄(5)"));
        assert!(text.contains("■ 紫: 5時間0分 (4件)"));
        assert!(text.contains("(他1件)"));
        assert!(text.contains("最も多い色: 紫"));
    }

    #[test]
    fn empty_analysis_has_no_summary_block() {
        let analysis = TimeAggregator::new(ColorPalette::new(Locale::En)).analyze(&[]);
        let text = render_report(&period(), &no_filter(), &analysis, Locale::En);
        assert!(text.ends_with("No events found in this period."));
        assert!(!text.contains("Most used"));
    }
}
