//! Configuration management commands.

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { force } => init_config(force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(none, using defaults)"),
    }

    let commerce = &ctx.config.commerce;
    ctx.output.kv("currency", commerce.currency.code());

    ctx.output.info("[checkout]");
    ctx.output.kv("max_attempts", &commerce.checkout.max_attempts.to_string());
    ctx.output.kv("backoff", &format!("{:?}", commerce.checkout.backoff));

    ctx.output.info("[allocator]");
    ctx.output.kv("max_attempts", &commerce.allocator.max_attempts.to_string());
    ctx.output.kv("backoff", &format!("{:?}", commerce.allocator.backoff));

    ctx.output.info("[persistence]");
    ctx.output.kv("debounce_ms", &commerce.persistence.debounce_ms.to_string());

    ctx.output.info("[simulate]");
    ctx.output.kv("shoppers", &ctx.config.simulate.shoppers.to_string());
    ctx.output.kv("quantity", &ctx.config.simulate.quantity.to_string());

    Ok(())
}

fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, generate_default_config())?;
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if let Err(e) = ctx.config.commerce.validate() {
        errors.push(e.to_string());
    }
    if ctx.config.simulate.shoppers == 0 {
        errors.push("simulate.shoppers must be at least 1".to_string());
    }
    if ctx.config.simulate.quantity <= 0 {
        errors.push("simulate.quantity must be positive".to_string());
    }

    let allocator_attempts = ctx.config.commerce.allocator.max_attempts as usize;
    if allocator_attempts < ctx.config.simulate.shoppers {
        warnings.push(format!(
            "allocator.max_attempts ({}) is below simulate.shoppers ({}); racing allocations may give up",
            allocator_attempts, ctx.config.simulate.shoppers
        ));
    }
    if ctx.config.commerce.persistence.debounce_ms == 0 {
        warnings.push("persistence.debounce_ms is 0; every cart change is written".to_string());
    }

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}
