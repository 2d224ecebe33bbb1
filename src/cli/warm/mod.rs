//! Warm command - one-shot cache warming

use tracing::info;

use super::WarmArgs;

/// Warms one tenant (optionally one stage) or every tenant, then prints the run summary
pub async fn run(args: WarmArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let state = crate::create_app_state(&config)?;

    let summary = match &args.tenant {
        Some(tenant) => state.manager.warm_tenant(tenant, args.stage).await?,
        None => state.manager.warm_all().await?,
    };

    info!(
        status = ?summary.status,
        completed = summary.tenants_completed,
        failed = summary.tenants_failed,
        "Warming finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.tenants_failed > 0 || summary.error.is_some() {
        anyhow::bail!("warming finished with failures");
    }

    Ok(())
}
