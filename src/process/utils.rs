/// Parse a numeric cell the way the loader accepts it: surrounding whitespace
/// is ignored and only finite values count.
pub fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a number for the load CSV in shortest round-trip form, never in
/// exponent notation.
pub fn render_number(v: f64) -> String {
    // -0.0 would otherwise render as "-0"
    if v == 0.0 {
        return "0".to_string();
    }
    v.to_string()
}

/// True when the object name ends in `.csv`, case-insensitively. A bare
/// `.csv` basename counts.
pub fn has_csv_extension(name: &str) -> bool {
    name.len() >= 4
        && name
            .get(name.len() - 4..)
            .map_or(false, |tail| tail.eq_ignore_ascii_case(".csv"))
}
