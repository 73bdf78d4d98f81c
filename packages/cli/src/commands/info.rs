use anyhow::Result;
use colored::Colorize;
use std::time::Duration;

use crate::api::ApiClient;
use crate::config::AppContext;

/// Fetch the sign-up questionnaire description
pub async fn run(ctx: &AppContext) -> Result<()> {
    let api = ApiClient::new(Duration::from_secs(10))?;
    let url = ctx.endpoints.inscription_info();

    let info: serde_json::Value = api.get(&url).await?;

    println!("{}", "Inscription".bold());
    println!("{}", "─".repeat(70));
    println!("{}", serde_json::to_string_pretty(&info)?);

    Ok(())
}
