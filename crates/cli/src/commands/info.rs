//! Service info command

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{print_info, print_json, OutputFormat};

/// Show the service greeting
pub async fn show_info(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info = client.info().await?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => print_info(&info.message),
    }

    Ok(())
}
