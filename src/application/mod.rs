pub mod color_analysis;
pub mod commands;
pub mod event_source;
pub mod oauth;
pub mod report;
