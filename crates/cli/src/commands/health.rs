//! Agent component health

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthReport, Readiness};
use crate::output::{color_status, format_timestamp, print_json, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct HealthSummary {
    ready: Readiness,
    health: HealthReport,
}

/// Show liveness and readiness of the agent's components
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let ready = client.readiness().await?;

    match format {
        OutputFormat::Json => print_json(&HealthSummary { ready, health })?,
        OutputFormat::Table => {
            println!("{}", "Agent Health".bold());
            println!("{}", "=".repeat(50));
            println!("Status:  {}", color_status(&health.status));
            match (ready.ready, ready.reason.as_deref()) {
                (true, _) => println!("Ready:   {}", "yes".green()),
                (false, Some(reason)) => println!("Ready:   {} ({})", "no".red(), reason),
                (false, None) => println!("Ready:   {}", "no".red()),
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    last_check: format_timestamp(component.last_check_timestamp),
                    message: component.message.clone().unwrap_or_else(|| "-".to_string()),
                })
                .collect();

            if !rows.is_empty() {
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
            }
        }
    }

    Ok(())
}
