use crate::graph::MetricValue;

const WHOLE_NUMBER_METRICS: [&str; 4] = ["impressions", "clicks", "cost", "inapps"];

/// Renders a metric for display: whole numbers for counts and cost, minutes
/// for `duration`, up to two decimals for everything else.
pub fn format_metric_value(value: &MetricValue, metric: &str) -> String {
    let number = match value {
        MetricValue::Number(number) => *number,
        MetricValue::Text(text) => return text.clone(),
        MetricValue::Flag(flag) => return flag.to_string(),
    };

    if !number.is_finite() {
        return "N/A".to_owned();
    }

    if WHOLE_NUMBER_METRICS.contains(&metric) {
        group_thousands(number, 0)
    } else if metric == "duration" {
        format!("{:.1} min", number / 60.0)
    } else {
        group_thousands(number, 2)
    }
}

/// `1234567.5` with two digits becomes `1,234,567.5`; trailing zeros in the
/// fraction are dropped.
fn group_thousands(value: f64, max_fraction_digits: usize) -> String {
    let rendered = format!("{:.*}", max_fraction_digits, value.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(rendered.len() + whole.len() / 3 + 1);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if !fraction.is_empty() {
        grouped.push('.');
        grouped.push_str(fraction);
    }

    if value < 0.0 && grouped.chars().any(|digit| digit.is_ascii_digit() && digit != '0') {
        format!("-{grouped}")
    } else {
        grouped
    }
}
