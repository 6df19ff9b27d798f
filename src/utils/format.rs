/// Format a number with comma thousands separators and a fixed number of decimals.
pub fn format_with_separator(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

/// Price for the console summary, e.g. `72,500.00 KRW`.
pub fn format_price(value: f64, currency: Option<&str>) -> String {
    let amount = format_with_separator(value, 2);
    match currency {
        Some(currency) => format!("{} {}", amount, currency),
        None => amount,
    }
}

/// Like `format_price`, for values that may be undefined.
pub fn format_optional_price(value: Option<f64>, currency: Option<&str>) -> String {
    value
        .map(|v| format_price(v, currency))
        .unwrap_or_else(|| "n/a".to_string())
}
