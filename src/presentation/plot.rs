// Chart rendering glue: time-bucket resampling and a small SVG line plot.
// The data path stays in QueryService; this module only draws.
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::measurement::Measurement;
use crate::presentation::escape_markup;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 40.0;

const PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
];

const AXIS_COLOR: &str = "#333";

/// Parse a `_resample` argument like `15m`, `1h` or `2d` into a bucket width.
pub fn parse_resample(spec: &str) -> Option<Duration> {
    let mut chars = spec.chars();
    let unit = chars.next_back()?;
    let amount: i64 = chars.as_str().parse().ok()?;
    if amount <= 0 {
        return None;
    }
    // the amount comes straight from the query string; overflow is None,
    // never a panic
    match unit {
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}

/// Mean-aggregate records into fixed time buckets per tag. Output is ordered
/// newest bucket first; each record's created_at is its bucket start.
pub fn resample(records: &[Measurement], bucket: Duration) -> Vec<Measurement> {
    let step = bucket.num_seconds().max(1);
    let mut buckets: BTreeMap<(i64, String), (f64, usize)> = BTreeMap::new();
    for record in records {
        let start = record.created_at.timestamp().div_euclid(step) * step;
        let entry = buckets
            .entry((start, record.measurement.clone()))
            .or_insert((0.0, 0));
        entry.0 += record.value;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .rev()
        .map(|((start, tag), (sum, count))| {
            let created_at: DateTime<Utc> = Utc
                .timestamp_opt(start, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            Measurement::new(sum / count as f64, tag, created_at)
        })
        .collect()
}

/// Render records as an SVG chart. `kind` is `line` (default) or `points`.
/// Callers must not pass an empty record set.
pub fn render_svg(records: &[Measurement], kind: &str) -> String {
    let (t_min, t_max) = min_max(records.iter().map(|r| r.created_at.timestamp() as f64));
    let (v_min, v_max) = min_max(records.iter().map(|r| r.value));
    let t_span = (t_max - t_min).max(1.0);
    let v_span = (v_max - v_min).max(f64::EPSILON);

    let x = |t: f64| MARGIN + (t - t_min) / t_span * (WIDTH - 2.0 * MARGIN);
    let y = |v: f64| HEIGHT - MARGIN - (v - v_min) / v_span * (HEIGHT - 2.0 * MARGIN);

    // group points per tag, oldest first so lines draw left to right
    let mut by_tag: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for record in records.iter().rev() {
        by_tag.entry(&record.measurement).or_default().push((
            x(record.created_at.timestamp() as f64),
            y(record.value),
        ));
    }

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    svg.push_str(&format!(
        r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="white"/>"#
    ));
    svg.push_str(&format!(
        r#"<line x1="{m}" y1="{m}" x2="{m}" y2="{b}" stroke="{axis}"/><line x1="{m}" y1="{b}" x2="{r}" y2="{b}" stroke="{axis}"/>"#,
        m = MARGIN,
        b = HEIGHT - MARGIN,
        r = WIDTH - MARGIN,
        axis = AXIS_COLOR,
    ));
    svg.push_str(&format!(
        r#"<text x="4" y="{}" font-size="11">{v_max:.1}</text><text x="4" y="{}" font-size="11">{v_min:.1}</text>"#,
        MARGIN,
        HEIGHT - MARGIN,
    ));

    for (index, (tag, points)) in by_tag.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        if kind == "points" {
            for (px, py) in points {
                svg.push_str(&format!(
                    r#"<circle cx="{px:.1}" cy="{py:.1}" r="2.5" fill="{color}"/>"#
                ));
            }
        } else {
            let path: Vec<String> = points
                .iter()
                .map(|(px, py)| format!("{px:.1},{py:.1}"))
                .collect();
            svg.push_str(&format!(
                r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="1.5"/>"#,
                path.join(" ")
            ));
        }
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-size="12" fill="{color}">{}</text>"#,
            WIDTH - MARGIN + 4.0,
            MARGIN + 14.0 * index as f64,
            escape_markup(tag),
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
