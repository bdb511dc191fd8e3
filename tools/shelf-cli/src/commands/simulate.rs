//! Concurrent shoppers racing for one stock pool.

use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use shelf_commerce::prelude::*;
use shelf_store::{Cache, MemoryStore};

use super::catalog::{load_catalog_file, read_product, seed_store};
use super::SimulateArgs;
use crate::context::Context;
use crate::output::tally;

/// How one shopper's visit ended.
#[derive(Debug)]
enum Visit {
    /// Checked out `units`, after `attempts` transaction attempts.
    Bought { units: i64, attempts: u32 },
    /// The cart refused the add: nothing left by its snapshot.
    TurnedAway,
    /// Checkout found too little stock.
    Rejected,
    /// Checkout lost every retry.
    Conflicted,
}

#[derive(Debug, Default, Serialize)]
struct SimulationReport {
    pool: String,
    shoppers: usize,
    quantity: i64,
    initial_stock: i64,
    final_stock: i64,
    units_sold: i64,
    bought: usize,
    turned_away: usize,
    rejected: usize,
    conflicted: usize,
    /// Most attempts any successful checkout needed.
    max_attempts: u32,
}

impl SimulationReport {
    fn record(&mut self, visit: Visit) {
        match visit {
            Visit::Bought { units, attempts } => {
                self.bought += 1;
                self.units_sold += units;
                self.max_attempts = self.max_attempts.max(attempts);
            }
            Visit::TurnedAway => self.turned_away += 1,
            Visit::Rejected => self.rejected += 1,
            Visit::Conflicted => self.conflicted += 1,
        }
    }

    /// Stock left matches what was sold and never went below zero.
    fn balanced(&self) -> bool {
        self.final_stock >= 0 && self.initial_stock - self.units_sold == self.final_stock
    }
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    config.commerce.validate()?;
    let shoppers = args.shoppers.unwrap_or(config.simulate.shoppers);
    let quantity = args.quantity.unwrap_or(config.simulate.quantity);
    if shoppers == 0 {
        bail!("--shoppers must be at least 1");
    }
    if quantity <= 0 {
        bail!("--quantity must be positive");
    }

    let currency = config.commerce.currency;
    let product_id = ProductId::new(args.product);
    let variant_id = args.variant.map(VariantId::new);

    let store = Arc::new(MemoryStore::new());
    seed_store(&store, load_catalog_file(&ctx.resolve_path(&args.catalog))?).await;

    let initial_stock = pool_stock(&store, &product_id, variant_id.as_ref(), currency).await?;
    let pool = PoolKey::for_line(&product_id, variant_id.as_ref());

    let mut request = LineRequest::new(product_id.clone(), quantity);
    if let Some(v) = &variant_id {
        request = request.variant(v.clone());
    }

    let pb = ctx.output.progress(shoppers as u64, "shoppers");
    let handles: Vec<_> = (0..shoppers)
        .map(|_| {
            let store = Arc::clone(&store);
            let commerce = config.commerce.clone();
            let request = request.clone();
            tokio::spawn(async move { visit(store, commerce, request).await })
        })
        .collect();

    let mut report = SimulationReport {
        pool: pool.to_string(),
        shoppers,
        quantity,
        initial_stock,
        ..Default::default()
    };
    for handle in handles {
        let outcome = handle.await.context("Shopper task panicked")??;
        report.record(outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    report.final_stock = pool_stock(&store, &product_id, variant_id.as_ref(), currency).await?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        print_report(&report, ctx);
    }

    if !report.balanced() {
        bail!(
            "Stock does not balance: started at {}, sold {}, {} left",
            report.initial_stock,
            report.units_sold,
            report.final_stock
        );
    }
    ctx.output.success("No oversell");

    Ok(())
}

/// One shopper: open a session, add the request, check out.
async fn visit(
    store: Arc<MemoryStore>,
    config: CommerceConfig,
    request: LineRequest,
) -> Result<Visit, CommerceError> {
    let mut session = CartSession::open(Identity::new_guest(), store, Cache::in_memory(), config).await?;

    match session.add(request) {
        Ok(_) => {}
        Err(CommerceError::Cart(CartError::OutOfStock { .. })) => return Ok(Visit::TurnedAway),
        Err(e) => return Err(e),
    }

    match session.checkout().await {
        Ok(receipt) => Ok(Visit::Bought {
            units: receipt.units(),
            attempts: receipt.attempts,
        }),
        Err(CommerceError::Checkout(CheckoutError::TransactionConflict { .. })) => {
            Ok(Visit::Conflicted)
        }
        Err(CommerceError::Checkout(
            CheckoutError::InsufficientStock { .. } | CheckoutError::InsufficientExtraStock { .. },
        )) => Ok(Visit::Rejected),
        Err(e) => Err(e),
    }
}

async fn pool_stock(
    store: &MemoryStore,
    product_id: &ProductId,
    variant_id: Option<&VariantId>,
    currency: Currency,
) -> Result<i64> {
    let product = read_product(store, product_id, currency)
        .await?
        .with_context(|| format!("Product not in catalog: {}", product_id))?;
    match product.pool_stock(variant_id) {
        Some(stock) => Ok(stock),
        None => bail!(
            "Variant not found: {}/{}",
            product_id,
            variant_id.map(VariantId::as_str).unwrap_or_default()
        ),
    }
}

fn print_report(report: &SimulationReport, ctx: &Context) {
    ctx.output.header(&format!("Simulation: {}", report.pool));
    ctx.output.kv("shoppers", &report.shoppers.to_string());
    ctx.output.kv("units each", &report.quantity.to_string());
    ctx.output.kv("stock before", &report.initial_stock.to_string());
    ctx.output.kv("stock after", &report.final_stock.to_string());
    ctx.output.kv("units sold", &report.units_sold.to_string());
    ctx.output.kv("checked out", &tally(report.bought, true));
    ctx.output.kv("turned away at cart", &tally(report.turned_away, false));
    ctx.output.kv("rejected at checkout", &tally(report.rejected, false));
    ctx.output.kv("gave up on conflicts", &tally(report.conflicted, false));
    ctx.output.kv("most attempts", &report.max_attempts.to_string());
}
