//! Race many buyers for one product and report how the attempts ended.
//!
//! Seeds a product and a buyer, then fires `--buyers` identical purchases at
//! once. Uses PostgreSQL when a database URL is configured (flag or
//! `STOREFRONT_DATABASE_URL`) and the in-memory store otherwise.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use storefront::config::StorefrontSettings;
use storefront::domain::ports::{ExecutionContext, TransactionExecutor};
use storefront::domain::{
    Gender, Money, NewUser, ProductDetails, PurchaseRequest, PurchaseService, Quantity,
    StorefrontService, UserProfile, Username,
};
use storefront::harness::{HarnessReport, PurchaseHarness};
use storefront::outbound::memory::InMemoryStore;
use storefront::outbound::persistence::{
    DbPool, DieselTransactionExecutor, PoolConfig, run_migrations,
};
use storefront::telemetry::init_tracing;
use tokio::runtime::Builder;
use tracing::info;
use uuid::Uuid;

/// `purchase-load` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "purchase-load",
    about = "Race concurrent buyers for one product and report the outcomes",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `STOREFRONT_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Units of the product in stock.
    #[arg(long, default_value_t = 6)]
    stock: u32,
    /// Unit price in minor currency units.
    #[arg(long, default_value_t = 100)]
    price: i64,
    /// Buyer's opening balance in minor currency units.
    #[arg(long, default_value_t = 1_000)]
    balance: i64,
    /// Number of simultaneous purchase attempts.
    #[arg(long, default_value_t = 5)]
    buyers: usize,
    /// Units requested by each attempt.
    #[arg(long, default_value_t = 1)]
    quantity: i64,
    /// Per-attempt timeout. Falls back to `STOREFRONT_PURCHASE_TIMEOUT_MS`.
    #[arg(long = "timeout-ms", value_name = "ms")]
    timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CliArgs::parse();
    let settings = StorefrontSettings::load_from_iter([OsString::from("purchase-load")])
        .map_err(|error| eyre!("failed to load settings: {error}"))?;
    init_tracing(settings.log_format());

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(async_main(args, settings))
}

async fn async_main(args: CliArgs, settings: StorefrontSettings) -> Result<()> {
    let context = match args
        .timeout_ms
        .map(Duration::from_millis)
        .or_else(|| settings.purchase_timeout())
    {
        Some(timeout) => ExecutionContext::new().with_timeout(timeout),
        None => ExecutionContext::new(),
    };

    let database_url = args
        .database_url
        .clone()
        .or_else(|| settings.database_url().map(str::to_owned));

    let report = match database_url {
        Some(url) => {
            let migration_url = url.clone();
            tokio::task::spawn_blocking(move || run_migrations(&migration_url))
                .await
                .wrap_err("migration task failed")?
                .wrap_err("failed to apply migrations")?;
            let pool = DbPool::new(PoolConfig::new(url).with_settings(&settings))
                .await
                .wrap_err("failed to create database pool")?;
            race(DieselTransactionExecutor::new(pool), &args, context).await?
        }
        None => {
            info!("no database configured, using the in-memory store");
            race(InMemoryStore::new(), &args, context).await?
        }
    };

    info!(
        attempts = report.attempts(),
        succeeded = report.succeeded,
        insufficient_stock = report.insufficient_stock,
        insufficient_funds = report.insufficient_funds,
        not_found = report.not_found,
        other_failures = report.other_failures,
        "purchase load finished"
    );
    Ok(())
}

async fn race<X>(executor: X, args: &CliArgs, context: ExecutionContext) -> Result<HarnessReport>
where
    X: TransactionExecutor + Clone + 'static,
{
    let storefront = StorefrontService::new(executor.clone());
    let details =
        ProductDetails::try_new("Load test product", Money::new(args.price)?, args.stock)?;
    let product = storefront.create_product(details).await?;
    let profile = UserProfile::try_new("Load", "", "Tester", Gender::Male, 30)?;
    let username = Username::new(format!("loadtester{}", Uuid::new_v4().simple()))?;
    let user = storefront
        .register_user(NewUser::new(username, profile, Money::new(args.balance)?))
        .await?;
    info!(product = %product.id(), user = %user.id(), "seeded product and buyer");

    let request = PurchaseRequest::new(user.id(), product.id(), Quantity::new(args.quantity)?);
    let harness = PurchaseHarness::new(PurchaseService::new(executor)).with_context(context);
    let report = harness.run_repeated(request, args.buyers).await;

    let product = storefront.get_product(product.id()).await?;
    let user = storefront.get_user(user.id()).await?;
    info!(
        remaining_stock = product.in_stock(),
        remaining_balance = %user.balance(),
        "final state"
    );
    Ok(report)
}
