//! Flush command - one-shot invalidation

use super::FlushArgs;

/// Invalidates one tenant (optionally one resource's fan-out) or the whole cache
pub async fn run(args: FlushArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let state = crate::create_app_state(&config)?;

    let output = match &args.tenant {
        Some(tenant) => {
            let report = state
                .manager
                .invalidate_for_tenant(tenant, args.resource)
                .await?;
            serde_json::to_string_pretty(&report)?
        }
        None => serde_json::to_string_pretty(&state.manager.invalidate_all().await)?,
    };

    println!("{}", output);
    Ok(())
}
