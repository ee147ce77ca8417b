use crate::domain::color_palette::ColorPalette;
use crate::domain::duration::event_hours;
use crate::domain::models::{CalendarEvent, EventTime};
use chrono::NaiveTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

pub const UNTITLED_EVENT: &str = "(No title)";
pub const UNKNOWN_TIME_LABEL: &str = "Unknown time";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventSummary {
    pub title: String,
    pub duration_hours: f64,
    pub start: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorGroup {
    pub color_name: String,
    pub total_hours: f64,
    pub event_count: usize,
    pub events: Vec<EventSummary>,
}

/// Color groups ordered by total hours, serialized as a name-keyed map that
/// keeps that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorBreakdown(Vec<ColorGroup>);

impl ColorBreakdown {
    pub fn groups(&self) -> &[ColorGroup] {
        &self.0
    }

    pub fn get(&self, color_name: &str) -> Option<&ColorGroup> {
        self.0.iter().find(|group| group.color_name == color_name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize)]
struct ColorGroupBody<'a> {
    total_hours: f64,
    event_count: usize,
    events: &'a [EventSummary],
}

impl Serialize for ColorBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for group in &self.0 {
            map.serialize_entry(
                &group.color_name,
                &ColorGroupBody {
                    total_hours: group.total_hours,
                    event_count: group.event_count,
                    events: &group.events,
                },
            )?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MostUsedColor {
    pub name: String,
    pub hours: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalysisSummary {
    pub total_hours: f64,
    pub total_events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_used_color: Option<MostUsedColor>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColorTimeAnalysis {
    pub color_breakdown: ColorBreakdown,
    pub summary: AnalysisSummary,
}

#[derive(Debug)]
struct GroupAccumulator {
    color_name: String,
    hours: f64,
    events: Vec<EventSummary>,
}

/// Groups already-filtered events by color and totals their hours.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeAggregator {
    palette: ColorPalette,
}

impl TimeAggregator {
    pub fn new(palette: ColorPalette) -> Self {
        Self { palette }
    }

    pub fn analyze(&self, events: &[CalendarEvent]) -> ColorTimeAnalysis {
        let mut index_by_name: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<GroupAccumulator> = Vec::new();

        for event in events {
            let color_name = self.palette.group_name(event.color_id);
            let hours = event_hours(event);
            let slot = match index_by_name.get(&color_name) {
                Some(slot) => *slot,
                None => {
                    groups.push(GroupAccumulator {
                        color_name: color_name.clone(),
                        hours: 0.0,
                        events: Vec::new(),
                    });
                    index_by_name.insert(color_name, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let group = &mut groups[slot];
            group.hours += hours;
            group.events.push(EventSummary {
                title: display_title(event.title.as_deref()),
                duration_hours: hours,
                start: start_label(&event.start),
            });
        }

        // Sort on unrounded totals; the stable sort keeps first-seen order on ties.
        groups.sort_by(|left, right| right.hours.total_cmp(&left.hours));

        let color_breakdown = ColorBreakdown(
            groups
                .into_iter()
                .map(|group| ColorGroup {
                    color_name: group.color_name,
                    total_hours: round_to(group.hours, 2),
                    event_count: group.events.len(),
                    events: group.events,
                })
                .collect(),
        );

        let total_hours = round_to(
            color_breakdown
                .groups()
                .iter()
                .map(|group| group.total_hours)
                .sum(),
            2,
        );
        let most_used_color = color_breakdown.groups().first().map(|top| MostUsedColor {
            name: top.color_name.clone(),
            hours: top.total_hours,
            percentage: if total_hours > 0.0 {
                round_to(top.total_hours / total_hours * 100.0, 1)
            } else {
                0.0
            },
        });

        ColorTimeAnalysis {
            color_breakdown,
            summary: AnalysisSummary {
                total_hours,
                total_events: events.len(),
                most_used_color,
            },
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn display_title(title: Option<&str>) -> String {
    title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(UNTITLED_EVENT)
        .to_string()
}

/// Start label for listings. A timed start at exactly midnight is shown as
/// all-day, so genuine midnight meetings are labelled the same way.
pub fn start_label(start: &EventTime) -> String {
    if let Some(date_time) = start.date_time {
        if date_time.time() == NaiveTime::MIN {
            return format!("{} (All-day)", date_time.format("%Y-%m-%d"));
        }
        return date_time.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Some(date) = start.date {
        return format!("{} (All-day)", date.format("%Y-%m-%d"));
    }
    UNKNOWN_TIME_LABEL.to_string()
}
