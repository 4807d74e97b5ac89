//! Recent and persisted tick history

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, RecordsResponse, TickRecord};
use crate::output::{
    color_anomaly, color_score, color_status, format_percent, format_timestamp, print_json,
    print_warning, OutputFormat,
};

/// Row for the records table
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "RAM")]
    ram: String,
    #[tabled(rename = "Disk")]
    disk: String,
    #[tabled(rename = "Anomaly")]
    anomaly: String,
}

impl From<&TickRecord> for RecordRow {
    fn from(tick: &TickRecord) -> Self {
        Self {
            time: format_timestamp(tick.timestamp),
            score: color_score(tick.health_score),
            tier: color_status(&tick.tier),
            cpu: format_percent(tick.cpu),
            ram: format_percent(tick.ram),
            disk: format_percent(tick.disk),
            anomaly: color_anomaly(tick.anomaly),
        }
    }
}

/// List the most recent ticks, newest first
pub async fn show_records(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let response = client.records(limit).await?;
    print_records(&response, format, "No ticks recorded yet")
}

/// List ticks read back from the agent's persistent log, newest first
pub async fn show_log(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let response = client.log(limit).await?;
    print_records(&response, format, "The tick log is empty")
}

fn print_records(response: &RecordsResponse, format: OutputFormat, empty: &str) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(response)?,
        OutputFormat::Table => {
            if response.records.is_empty() {
                print_warning(empty);
                return Ok(());
            }

            let rows: Vec<RecordRow> = response.records.iter().map(RecordRow::from).collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nShowing {} records", response.count);
        }
    }

    Ok(())
}
