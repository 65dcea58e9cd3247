//! Button batch parsing (`text|url, text2|url2`) and keyboard layout.

use crate::error::ButtonParseError;
use crate::types::Button;

/// Buttons per keyboard row when previewing or rendering a filter.
pub const BUTTONS_PER_ROW: usize = 2;

const URL_SCHEMES: &[&str] = &["http://", "https://"];

/// Parse a comma-separated batch. Any bad segment rejects the whole batch.
pub fn parse_buttons(input: &str) -> Result<Vec<Button>, ButtonParseError> {
    input.trim().split(',').map(parse_segment).collect()
}

fn parse_segment(raw: &str) -> Result<Button, ButtonParseError> {
    let segment = raw.trim();
    let (text, url) = segment
        .split_once('|')
        .ok_or_else(|| ButtonParseError::MissingSeparator {
            segment: segment.to_string(),
        })?;

    if url.contains('|') {
        return Err(ButtonParseError::ExtraSeparator {
            segment: segment.to_string(),
        });
    }

    let text = text.trim();
    let url = url.trim();

    if text.is_empty() {
        return Err(ButtonParseError::EmptyText {
            segment: segment.to_string(),
        });
    }
    if !URL_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(ButtonParseError::InvalidUrl {
            url: url.to_string(),
        });
    }

    Ok(Button {
        text: text.to_string(),
        url: url.to_string(),
    })
}

/// Lay buttons out `BUTTONS_PER_ROW` to a row, preserving order.
pub fn keyboard_rows(buttons: &[Button]) -> Vec<Vec<Button>> {
    buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|row| row.to_vec())
        .collect()
}
