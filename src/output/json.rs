use crate::error::Result;

use super::Report;

/// Render a report as pretty-printed JSON.
pub fn render(report: &Report<'_>) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}
