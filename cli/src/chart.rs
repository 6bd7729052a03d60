//! Plain-text bar charts.

const FULL: char = '█';
const PARTIAL: [char; 8] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉'];

/// A bar of at most `width` cells for `value` on a `[0, max]` scale, with
/// eighth-cell resolution.
pub fn bar(value: f64, max: f64, width: usize) -> String {
    if !(max > 0.0) || !(value > 0.0) || width == 0 {
        return String::new();
    }
    let eighths = ((value / max).min(1.0) * width as f64 * 8.0).round() as usize;
    let mut out: String = std::iter::repeat(FULL).take(eighths / 8).collect();
    if eighths % 8 > 0 {
        out.push(PARTIAL[eighths % 8]);
    }
    out
}

/// One labelled bar per value, scaled to the largest value.
pub fn render(labels: &[String], values: &[f64], width: usize) -> String {
    let max = values.iter().copied().fold(0.0, f64::max);
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for (label, value) in labels.iter().zip(values) {
        let pad = label_width - label.chars().count();
        out.push_str(&format!(
            "{label}{} │{:<width$} {value:.4}\n",
            " ".repeat(pad),
            bar(*value, max, width),
        ));
    }
    out
}

/// Unlabelled chart of a series, one row per value.
pub fn series(values: &[f64], width: usize) -> String {
    let labels: Vec<String> = (1..=values.len()).map(|i| format!("#{i}")).collect();
    render(&labels, values, width)
}
