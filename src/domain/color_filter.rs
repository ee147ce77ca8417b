use crate::domain::color_palette::{ColorInput, ColorPalette};
use crate::domain::models::CalendarEvent;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColorFilterSummary {
    pub include_colors: Option<String>,
    pub exclude_colors: Option<String>,
    pub has_filters: bool,
}

/// Include/exclude color selection. Include wins outright when both are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorFilter {
    palette: ColorPalette,
    include: Vec<i64>,
    exclude: Vec<i64>,
}

impl ColorFilter {
    /// Builds a filter from raw caller input. Any entry that is neither a
    /// valid id nor a known name is rejected.
    pub fn new(
        palette: ColorPalette,
        include: Option<&[ColorInput]>,
        exclude: Option<&[ColorInput]>,
    ) -> Result<Self, String> {
        Ok(Self {
            palette,
            include: validated_ids(&palette, include, "include_colors")?,
            exclude: validated_ids(&palette, exclude, "exclude_colors")?,
        })
    }

    pub fn none(palette: ColorPalette) -> Self {
        Self {
            palette,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn has_filters(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    pub fn keeps(&self, event: &CalendarEvent) -> bool {
        let color_id = self.palette.effective_color_id(event.color_id);
        if !self.include.is_empty() {
            return self.include.contains(&color_id);
        }
        if !self.exclude.is_empty() {
            return !self.exclude.contains(&color_id);
        }
        true
    }

    pub fn apply(&self, events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
        if !self.has_filters() {
            return events;
        }
        events.into_iter().filter(|event| self.keeps(event)).collect()
    }

    pub fn summary(&self) -> ColorFilterSummary {
        ColorFilterSummary {
            include_colors: self.format_ids(&self.include),
            exclude_colors: self.format_ids(&self.exclude),
            has_filters: self.has_filters(),
        }
    }

    fn format_ids(&self, ids: &[i64]) -> Option<String> {
        if ids.is_empty() {
            return None;
        }
        Some(
            ids.iter()
                .map(|id| self.palette.label(*id))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

fn validated_ids(
    palette: &ColorPalette,
    inputs: Option<&[ColorInput]>,
    field_name: &str,
) -> Result<Vec<i64>, String> {
    let Some(inputs) = inputs else {
        return Ok(Vec::new());
    };
    let invalid: Vec<String> = inputs
        .iter()
        .filter(|input| palette.resolve(input).is_none())
        .map(ColorInput::describe)
        .collect();
    if !invalid.is_empty() {
        return Err(format!(
            "{field_name} contains invalid colors: {} (use ids 1-11 or color names)",
            invalid.join(", ")
        ));
    }
    Ok(palette.normalize(inputs))
}
