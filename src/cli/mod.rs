//! CLI module for the rental cache service
//!
//! Subcommands:
//! - `serve`: admin HTTP server plus background cache maintenance
//! - `warm`: one-shot cache warming
//! - `flush`: one-shot invalidation
//! - `stats`: print store statistics and health

pub mod flush;
pub mod serve;
pub mod stats;
pub mod warm;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::cache::ResourceType;
use crate::domain::tenant::TenantId;
use crate::domain::warming::WarmingStage;
use crate::infrastructure::logging;

/// Rental cache - tenant-scoped caching, invalidation and warming
#[derive(Parser)]
#[command(name = "rental-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the admin API and background cache manager
    Serve,

    /// Warm the cache once and exit
    Warm(WarmArgs),

    /// Invalidate cache entries and exit
    Flush(FlushArgs),

    /// Print cache statistics and health
    Stats,
}

#[derive(Args, Debug)]
pub struct WarmArgs {
    /// Warm only this tenant (all tenants when omitted)
    #[arg(long)]
    pub tenant: Option<TenantId>,

    /// Warm only this stage (dashboard, lists, payments, financial); requires --tenant
    #[arg(long, requires = "tenant")]
    pub stage: Option<WarmingStage>,
}

#[derive(Args, Debug)]
pub struct FlushArgs {
    /// Invalidate only this tenant (whole cache when omitted)
    #[arg(long)]
    pub tenant: Option<TenantId>,

    /// Narrow to one resource's fan-out (property, tenant, payment, lease, maintenance)
    #[arg(long, requires = "tenant")]
    pub resource: Option<ResourceType>,
}

/// Loads `.env` and configuration, then installs logging
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
