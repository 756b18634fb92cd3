//! Parsing for the two time argument forms the command boundary accepts:
//! `H:MM:SS` / `M:SS`, and a units form like `30s` / `1m30s`.

use crate::error::ChorusError;

/// Parses a duration argument into whole seconds.
///
/// Accepts `H:MM:SS`, `M:SS`, or a units form such as `30s`, `1m30s`, `1h2m3s`.
pub fn parse_time_arg(input: &str) -> Result<u64, ChorusError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ChorusError::InvalidArgument("empty time value".into()));
    }

    if input.contains(':') {
        parse_colon_form(input)
    } else {
        parse_units_form(input)
    }
}

fn parse_colon_form(input: &str) -> Result<u64, ChorusError> {
    let parts: Vec<&str> = input.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(ChorusError::InvalidArgument(format!(
            "expected M:SS or H:MM:SS, got '{input}'"
        )));
    }
    let nums: Result<Vec<u64>, _> = parts.iter().map(|p| p.parse::<u64>()).collect();
    let nums = nums.map_err(|_| {
        ChorusError::InvalidArgument(format!("non-numeric component in '{input}'"))
    })?;

    let total = match nums.as_slice() {
        [m, s] => {
            if *s >= 60 {
                return Err(ChorusError::InvalidArgument("seconds must be < 60".into()));
            }
            m * 60 + s
        }
        [h, m, s] => {
            if *m >= 60 || *s >= 60 {
                return Err(ChorusError::InvalidArgument(
                    "minutes/seconds must be < 60".into(),
                ));
            }
            h * 3600 + m * 60 + s
        }
        _ => unreachable!(),
    };
    Ok(total)
}

fn parse_units_form(input: &str) -> Result<u64, ChorusError> {
    let mut total: u64 = 0;
    let mut number = String::new();
    let mut seen_unit = false;

    for ch in input.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let unit_secs = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => {
                return Err(ChorusError::InvalidArgument(format!(
                    "unrecognized unit '{ch}' in '{input}'"
                )))
            }
        };
        if number.is_empty() {
            return Err(ChorusError::InvalidArgument(format!(
                "unit '{ch}' with no preceding number in '{input}'"
            )));
        }
        let n: u64 = number
            .parse()
            .map_err(|_| ChorusError::InvalidArgument(format!("bad number in '{input}'")))?;
        total += n * unit_secs;
        number.clear();
        seen_unit = true;
    }

    if !number.is_empty() || !seen_unit {
        return Err(ChorusError::InvalidArgument(format!(
            "dangling number or no units in '{input}'"
        )));
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mm_ss() {
        assert_eq!(parse_time_arg("1:30").unwrap(), 90);
    }

    #[test]
    fn parses_h_mm_ss() {
        assert_eq!(parse_time_arg("1:02:03").unwrap(), 3723);
    }

    #[test]
    fn parses_units_form() {
        assert_eq!(parse_time_arg("30s").unwrap(), 30);
        assert_eq!(parse_time_arg("1m30s").unwrap(), 90);
        assert_eq!(parse_time_arg("1h2m3s").unwrap(), 3723);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_time_arg("").is_err());
        assert!(parse_time_arg("abc").is_err());
        assert!(parse_time_arg("1:99").is_err());
        assert!(parse_time_arg("5x").is_err());
    }
}
