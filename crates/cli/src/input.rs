//! Parsing of numeric values typed on the command line or read from a file

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("no values given")]
    Empty,

    #[error("value {position} ('{value}') is not a finite number")]
    NotANumber { position: usize, value: String },

    #[error("line {line}: {reason}")]
    Line { line: usize, reason: String },

    #[error("no rows given, use --row or --file")]
    NoRows,
}

/// Parse a comma-separated list such as `1.0, 2, -3.5`
pub fn parse_values(input: &str) -> Result<Vec<f64>, InputError> {
    if input.trim().is_empty() {
        return Err(InputError::Empty);
    }

    input
        .split(',')
        .enumerate()
        .map(|(position, raw)| {
            let raw = raw.trim();
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(InputError::NotANumber {
                    position,
                    value: raw.to_string(),
                }),
            }
        })
        .collect()
}

/// Parse one row per line; blank lines and `#` comments are skipped
pub fn parse_rows(content: &str) -> Result<Vec<Vec<f64>>, InputError> {
    let mut rows = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = parse_values(line).map_err(|e| InputError::Line {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(InputError::NoRows);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_values("1.0,2.0,3.0").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(parse_values(" 4, -5.5 ,6e2").unwrap(), vec![4.0, -5.5, 600.0]);
    }

    #[test]
    fn test_parse_values_rejects_text() {
        let err = parse_values("1.0,abc,3").unwrap_err();
        assert_eq!(
            err,
            InputError::NotANumber {
                position: 1,
                value: "abc".to_string()
            }
        );
        assert_eq!(err.to_string(), "value 1 ('abc') is not a finite number");
    }

    #[test]
    fn test_parse_values_rejects_empty_and_non_finite() {
        assert_eq!(parse_values("   ").unwrap_err(), InputError::Empty);
        assert!(parse_values("1,,2").is_err());
        assert!(parse_values("NaN").is_err());
        assert!(parse_values("1,inf").is_err());
    }

    #[test]
    fn test_parse_rows() {
        let content = "# features\n1,2,3\n\n4,5,6\n";
        let rows = parse_rows(content).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_parse_rows_reports_line() {
        let err = parse_rows("1,2,3\n4,x,6\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 2: value 1 ('x') is not a finite number"
        );
    }

    #[test]
    fn test_parse_rows_requires_a_row() {
        assert_eq!(parse_rows("\n# nothing\n").unwrap_err(), InputError::NoRows);
    }
}
