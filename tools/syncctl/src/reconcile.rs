//! Interactive-equivalent reconciliation commands

use std::path::Path;

use anyhow::{bail, Result};
use colored::*;
use errors::SyncError;
use terminal_sync::{DetailRequest, HttpBackend, SessionPhase, SyncSession};
use tracing::info;

use crate::context::SyncContext;
use crate::plan::ReconciliationPlan;
use crate::render;

pub struct ReconcileOptions<'a> {
    pub plan: Option<&'a Path>,
    pub target: Option<&'a str>,
    pub dry_run: bool,
    pub json: bool,
}

fn request_for(ctx: &SyncContext, serial: &str) -> DetailRequest {
    DetailRequest::new(serial).with_project(ctx.project.clone())
}

async fn open_session(ctx: &SyncContext, serial: &str) -> Result<SyncSession<HttpBackend>> {
    let session = SyncSession::open(ctx.loader.clone(), request_for(ctx, serial)).await;
    if session.phase() == SessionPhase::Unavailable {
        eprintln!("{} data not found for {}", "WARN".yellow(), serial.bright_yellow());
        if let Some(notice) = session.last_error() {
            eprintln!("  {}", notice.message.dimmed());
        }
        bail!("sync detail unavailable for {}", serial);
    }
    Ok(session)
}

pub async fn show_command(ctx: &SyncContext, serial: &str, json: bool) -> Result<()> {
    let session = open_session(ctx, serial).await?;
    if let Some(review) = session.review() {
        if json {
            println!("{}", serde_json::to_string_pretty(&review)?);
        } else {
            render::print_review(&review);
        }
    }
    Ok(())
}

pub async fn reconcile_command(
    ctx: &SyncContext,
    serial: &str,
    options: ReconcileOptions<'_>,
) -> Result<()> {
    let mut session = open_session(ctx, serial).await?;

    // Ctrl-C: stop applying backend answers to this session
    let liveness = session.liveness();
    let interrupt = common::shutdown::on_shutdown(move || liveness.close());

    let result = run(&mut session, options).await;
    interrupt.abort();
    result
}

#[allow(clippy::disallowed_methods)] // json! macro internally uses unwrap (safe for known valid JSON)
async fn run(session: &mut SyncSession<HttpBackend>, options: ReconcileOptions<'_>) -> Result<()> {
    let mut plan = match options.plan {
        Some(path) => ReconciliationPlan::from_file(path)?,
        None => ReconciliationPlan::default(),
    };
    if let Some(target) = options.target {
        plan.target = Some(target.to_string());
    }
    if !plan.is_empty() {
        plan.apply(session).await?;
    }

    let review = session
        .review()
        .ok_or(SyncError::SessionClosed)?;
    let submission = session.assemble();

    if options.json {
        let payload = submission.as_ref().ok();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "review": review,
                "payload": payload,
            }))?
        );
    } else {
        render::print_review(&review);
        if let Ok(submission) = &submission {
            println!();
            render::print_submission(submission);
        }
    }

    // Validation failures stop here, before any network call
    submission?;

    if options.dry_run {
        info!("Dry run, nothing submitted");
        session.close();
        return Ok(());
    }

    let receipt = session.submit().await?;
    render::print_receipt(&receipt);
    Ok(())
}
