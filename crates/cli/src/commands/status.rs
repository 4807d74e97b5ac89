//! Current health status

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, TickRecord};
use crate::output::{
    color_anomaly, color_score, color_status, format_bytes, format_duration, format_percent,
    format_timestamp, print_info, print_json, OutputFormat,
};

/// Show the latest tick served by the agent
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("{}", "Host Health".bold());
            println!("{}", "=".repeat(50));
            println!("Host:            {}", status.host.cyan());
            println!("Uptime:          {}", format_duration(status.uptime_secs));
            println!(
                "Mode:            {}",
                if status.sampling {
                    "background sampling"
                } else {
                    "on demand"
                }
            );
            println!();
            print_tick(&status.latest);
        }
    }

    Ok(())
}

/// Force a tick on the agent and show its result
pub async fn run_tick(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let tick = client.tick().await?;

    match format {
        OutputFormat::Json => print_json(&tick)?,
        OutputFormat::Table => print_tick(&tick),
    }

    Ok(())
}

fn print_tick(tick: &TickRecord) {
    println!("Sampled:         {}", format_timestamp(tick.timestamp));
    println!(
        "Score:           {} ({})",
        color_score(tick.health_score),
        color_status(&tick.tier)
    );
    println!("Anomaly:         {}", color_anomaly(tick.anomaly));
    if !tick.anomalous_signals.is_empty() {
        println!("Signals:         {}", tick.anomalous_signals.join(", ").red());
    }
    println!();
    println!("{}", "Readings".bold());
    println!("{}", "-".repeat(50));
    println!("CPU:             {}", format_percent(tick.cpu));
    println!("RAM:             {}", format_percent(tick.ram));
    println!("Disk:            {}", format_percent(tick.disk));
    println!("Network total:   {}", format_bytes(tick.network_bytes));
    println!();
    for fix in &tick.fixes {
        print_info(fix);
    }
}
