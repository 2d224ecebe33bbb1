//! Stats command - prints store statistics and a health probe

use serde_json::json;

/// Prints counters, entry count and store health as JSON
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let state = crate::create_app_state(&config)?;

    let health = state.manager.health_check().await;
    let statistics = state.manager.detailed_statistics().await;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "backend": format!("{:?}", config.cache.backend),
            "health": health,
            "statistics": statistics,
        }))?
    );

    if !health.is_healthy() {
        anyhow::bail!("cache store is unhealthy");
    }

    Ok(())
}
