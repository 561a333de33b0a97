//! Retraining command

use anyhow::{Context, Result};
use std::path::Path;

use crate::client::ApiClient;
use crate::input::{parse_rows, parse_values, InputError};
use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Collect training rows from repeated `--row` values or a file
pub fn collect_rows(rows: &[String], file: Option<&Path>) -> Result<Vec<Vec<f64>>> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(parse_rows(&content)?);
    }

    if rows.is_empty() {
        return Err(InputError::NoRows.into());
    }

    let parsed = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            parse_values(row).map_err(|e| InputError::Line {
                line: idx + 1,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parsed)
}

/// Send a labelled batch to the service
pub async fn run_retrain(
    client: &ApiClient,
    rows: &[String],
    file: Option<&Path>,
    labels: &str,
    format: OutputFormat,
) -> Result<()> {
    let data = collect_rows(rows, file)?;
    let labels = parse_values(labels)?;
    let row_count = data.len();

    let result = client.retrain(data, labels).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success(&result.message);
            print_info(&format!("Submitted {} training rows", row_count));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_collect_rows_from_flags() {
        let rows = vec!["1,2,3".to_string(), "4,5,6".to_string()];
        let parsed = collect_rows(&rows, None).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_collect_rows_reports_bad_row() {
        let rows = vec!["1,2,3".to_string(), "4,five,6".to_string()];
        let err = collect_rows(&rows, None).unwrap_err();
        assert!(err.downcast_ref::<InputError>().is_some());
        assert!(err.to_string().starts_with("line 2:"));
    }

    #[test]
    fn test_collect_rows_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file, "4,5,6").unwrap();

        let parsed = collect_rows(&[], Some(file.path())).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_collect_rows_requires_input() {
        let err = collect_rows(&[], None).unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::NoRows));
    }
}
