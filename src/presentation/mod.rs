// Presentation layer - HTTP surface
pub mod app_state;
pub mod error;
pub mod handlers;
pub mod plot;

/// Escape text interpolated into HTML or SVG markup.
pub(crate) fn escape_markup(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
