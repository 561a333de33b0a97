//! Prediction command

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::client::ApiClient;
use crate::input::parse_values;
use crate::output::{format_number, print_json, OutputFormat};

/// Row for the features table
#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    index: usize,
    #[tabled(rename = "Value")]
    value: String,
}

/// Row for the predictions table
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Output")]
    index: usize,
    #[tabled(rename = "Prediction")]
    value: String,
}

/// Send one comma-separated feature vector to the service
pub async fn run_predict(client: &ApiClient, values: &str, format: OutputFormat) -> Result<()> {
    // Reject non-numeric input before touching the network
    let data = parse_values(values)?;
    let result = client.predict(data.clone()).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Input".bold());
            let features: Vec<FeatureRow> = data
                .iter()
                .enumerate()
                .map(|(index, v)| FeatureRow {
                    index,
                    value: format_number(*v),
                })
                .collect();
            println!("{}", Table::new(features).with(Style::rounded()));

            println!("{}", "Prediction".bold());
            let predictions: Vec<PredictionRow> = result
                .predictions
                .iter()
                .enumerate()
                .map(|(index, v)| PredictionRow {
                    index,
                    value: format_number(*v).green().to_string(),
                })
                .collect();
            println!("{}", Table::new(predictions).with(Style::rounded()));
        }
    }

    Ok(())
}
