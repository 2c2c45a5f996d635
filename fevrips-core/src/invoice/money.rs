use super::render::RenderError;

/// Parse a decimal amount as found in the markup and format it as `$1,234.56`.
///
/// `field` names the amount in the error when `raw` is not a finite number.
pub fn format_currency(field: &str, raw: &str) -> Result<String, RenderError> {
    let invalid = || RenderError::InvalidAmount {
        field: field.to_string(),
        value: raw.to_string(),
    };
    let amount: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !amount.is_finite() {
        return Err(invalid());
    }
    Ok(format_amount(amount))
}

/// Thousands separators and exactly two decimals. The sign goes before `$`.
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}
