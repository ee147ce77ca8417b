pub mod attendance;
pub mod color_filter;
pub mod color_palette;
pub mod duration;
pub mod models;
pub mod time_aggregator;
