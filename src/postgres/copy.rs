//! Text-format COPY rows for the readings table.

use crate::reading::Reading;
use chrono::{SecondsFormat, SubsecRound};
use std::fmt::Write;

/// One tab-separated COPY line, newline-terminated, in table column order.
pub(in crate::postgres) fn encode_row(reading: &Reading) -> String {
    // Two float arrays dominate the row; ~20 bytes per element is a close guess.
    let mut line =
        String::with_capacity(64 + (reading.locations.len() + reading.values.len()) * 20);
    // Postgres rounds excess text digits; truncate like the binary bind does.
    line.push_str(
        &reading
            .timestamp
            .trunc_subsecs(6)
            .to_rfc3339_opts(SecondsFormat::Micros, true),
    );
    line.push('\t');
    let _ = write!(line, "{}", reading.asset_id);
    line.push('\t');
    push_text(&mut line, &reading.asset_type);
    line.push('\t');
    push_text(&mut line, &reading.metric_type);
    line.push('\t');
    push_float_array(&mut line, &reading.locations);
    line.push('\t');
    push_float_array(&mut line, &reading.values);
    line.push('\n');
    line
}

fn push_text(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
}

fn push_float_array(out: &mut String, values: &[f64]) {
    out.push('{');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_float(out, *value);
    }
    out.push('}');
}

// Display emits the shortest digits that parse back to the same bits.
fn push_float(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("NaN");
    } else if value.is_infinite() {
        out.push_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        let _ = write!(out, "{value}");
    }
}
