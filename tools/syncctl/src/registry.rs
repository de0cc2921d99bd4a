//! Read-only registry commands: inbox, catalog, free terminals

use anyhow::Result;
use colored::*;

use crate::context::SyncContext;
use crate::render;

pub async fn pending_command(ctx: &SyncContext, filter: Option<&str>, json: bool) -> Result<()> {
    let inbox = ctx.loader.load_inbox(&ctx.project).await?;
    let rows = inbox.filter(filter.unwrap_or_default());

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{} {} ({} of {} row(s))",
        "Sync inbox for".bright_cyan(),
        ctx.project.bright_yellow(),
        rows.len(),
        inbox.len()
    );
    render::print_inbox(&rows, inbox.pending_count());
    Ok(())
}

pub async fn catalog_command(ctx: &SyncContext, json: bool) -> Result<()> {
    let catalog = ctx.loader.load_catalog(&ctx.project).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(catalog.as_slice())?);
    } else {
        println!("{} {}", "Device catalog for".bright_cyan(), ctx.project.bright_yellow());
        render::print_catalog(&catalog);
    }
    Ok(())
}

pub async fn free_terminals_command(ctx: &SyncContext, json: bool) -> Result<()> {
    let terminals = ctx.loader.load_free_terminals(&ctx.project).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&terminals)?);
    } else {
        println!("{} {}", "Free terminals in".bright_cyan(), ctx.project.bright_yellow());
        render::print_terminals(&terminals);
    }
    Ok(())
}
