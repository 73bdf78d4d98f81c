use anyhow::Result;
use colored::Colorize;
use std::time::Duration;

use crate::api::ApiClient;
use crate::config::AppContext;

/// Probe each service root and report status and response time
pub async fn run(ctx: &AppContext, timeout_secs: u64) -> Result<()> {
    let api = ApiClient::new(Duration::from_secs(timeout_secs))?;

    println!(
        "{} ({})",
        "Service connectivity".bold(),
        ctx.environment.to_string().dimmed()
    );
    println!("{}", "─".repeat(78));
    println!(
        "  {:<18} {:<24} {:>8}  {}",
        "SERVICE".dimmed(),
        "STATUS".dimmed(),
        "TIME".dimmed(),
        "URL".dimmed(),
    );
    println!("{}", "─".repeat(78));

    let mut healthy = 0;
    let roots = ctx.endpoints.service_roots();

    for (name, url) in &roots {
        let probe = api.probe(url).await;

        let status = match (&probe.status, &probe.error) {
            (Some(code), _) if probe.is_ok() => format!("OK ({})", code.as_u16()).green(),
            (Some(code), _) => format!("Error {}", code.as_u16()).yellow(),
            (None, Some(err)) => format!("Error: {}", truncate(err, 17)).red(),
            (None, None) => "Unknown".dimmed(),
        };

        let elapsed = if probe.status.is_some() {
            format!("{}ms", probe.elapsed.as_millis())
        } else {
            "-".to_string()
        };

        if probe.is_ok() {
            healthy += 1;
        }

        println!("  {:<18} {:<24} {:>8}  {}", name, status, elapsed, url);
    }

    println!();
    println!("{}/{} service(s) reachable", healthy, roots.len());

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}…", cut)
    }
}
