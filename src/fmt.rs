/// Group the integer part with commas: 1234.5 at 2 decimals is "1,234.50".
pub fn grouped(val: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, val.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if val < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        out.push('-');
    }
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn amount(val: f64) -> String {
    grouped(val, 2)
}

pub fn format_bytes(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(1234.56), "1,234.56");
        assert_eq!(amount(-500.0), "-500.00");
        assert_eq!(amount(0.0), "0.00");
        assert_eq!(amount(-0.001), "0.00");
        assert_eq!(amount(1000000.99), "1,000,000.99");
    }

    #[test]
    fn test_grouped_units() {
        assert_eq!(grouped(12345.7, 0), "12,346");
        assert_eq!(grouped(2.125, 3), "2.125");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MB");
    }
}
