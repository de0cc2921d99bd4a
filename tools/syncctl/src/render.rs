//! Terminal output for reviews, payloads and inbox rows

use colored::*;
use errors::SyncError;
use terminal_sync::{
    DeviceDefinition, ExistingStatus, ItemStatus, MatchStatus, PendingSync, ReviewReport,
    SignatureStatus, SubmitReceipt, SyncSubmission, TargetTerminal,
};

fn item_status(status: ItemStatus) -> ColoredString {
    match status {
        ItemStatus::Unmapped => status.as_str().bright_red(),
        ItemStatus::Match => status.as_str().bright_green(),
        ItemStatus::Create => status.as_str().bright_blue(),
    }
}

fn existing_status(status: ExistingStatus) -> ColoredString {
    match status {
        ExistingStatus::Matched => status.as_str().bright_green(),
        ExistingStatus::Unmatched => status.as_str().bright_red(),
        ExistingStatus::KeepExisting => status.as_str().bright_yellow(),
        ExistingStatus::MappedManual => status.as_str().bright_cyan(),
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

pub fn print_review(review: &ReviewReport) {
    println!(
        "{} {} (sync {})",
        "Incoming:".bright_cyan(),
        review.item_serial_code.bright_yellow(),
        review.sync_id
    );
    match &review.target {
        Some(target) => println!(
            "{} {}{}",
            "Target:".bright_cyan(),
            target.label,
            if review.locked { " [locked]".dimmed().to_string() } else { String::new() }
        ),
        None => println!("{} {}", "Target:".bright_cyan(), "not selected".bright_red()),
    }

    println!();
    println!("{}", "Source items".bold());
    for row in &review.incoming {
        let mapped = match &row.decision {
            Some(d) => format!("{} [{}] {}", d.device_name, d.device_code, d.direction),
            None => "-".to_string(),
        };
        println!(
            "  {:<12} {:<9} {:<18} {:<16} -> {}",
            row.key.to_string(),
            item_status(row.status),
            or_dash(&row.item.item_type),
            or_dash(&row.item.serial_number),
            mapped
        );
    }

    if !review.existing.is_empty() {
        println!();
        println!("{}", "Registered devices".bold());
        for row in &review.existing {
            let name = row
                .decision
                .as_ref()
                .filter(|_| row.restored)
                .map(|d| format!("{} ({})", d.device_name, d.direction))
                .unwrap_or_else(|| row.device.device_name.clone());
            println!(
                "  {:<38} {:<14} {:<16} {}",
                row.key.to_string(),
                existing_status(row.status),
                or_dash(&row.device.serial_number),
                name
            );
        }
    }

    let c = &review.counts;
    println!();
    println!(
        "{} {} match, {} create, {} unmapped | {} matched, {} kept, {} edited, {} dropped",
        "Summary:".bright_cyan(),
        c.matched,
        c.create,
        c.unmapped,
        c.existing_matched,
        c.keep_existing,
        c.mapped_manual,
        c.unmatched
    );
}

pub fn print_submission(submission: &SyncSubmission) {
    println!(
        "{} {} -> {} ({} device(s))",
        "Payload:".bright_cyan(),
        submission.item_serial_code,
        submission.terminal_name.bright_yellow(),
        submission.devices.len()
    );
    for device in &submission.devices {
        println!(
            "  {:<20} {:<16} {:<5} {}{}",
            device.device_code,
            device.serial_number,
            device.direction.as_str(),
            device.device_name,
            device
                .id
                .as_deref()
                .map(|id| format!(" (updates {})", id).dimmed().to_string())
                .unwrap_or_default()
        );
    }
}

pub fn print_receipt(receipt: &SubmitReceipt) {
    println!(
        "{} {} device(s) synced{}",
        "OK".bright_green(),
        receipt.device_count,
        receipt
            .message
            .as_deref()
            .map(|m| format!(": {}", m))
            .unwrap_or_default()
    );
}

pub fn print_error(error: &SyncError) {
    let info = error.to_error_info();
    eprintln!("{} {}", "ERROR".bright_red(), info.message);
    if let Some(details) = &info.details {
        eprintln!("  {}", details.dimmed());
    }
    let mut fields: Vec<_> = info.field_errors.iter().collect();
    fields.sort();
    for (field, messages) in fields {
        eprintln!("  {}: {}", field.bright_yellow(), messages.join(", "));
    }
}

pub fn print_inbox(rows: &[&PendingSync], pending: usize) {
    for row in rows {
        let status = match row.match_status {
            MatchStatus::Match => row.match_status.as_str().bright_green(),
            _ => row.match_status.as_str().bright_red(),
        };
        let signature = match row.signature_status {
            Some(SignatureStatus::SignatureValid) => "SIGNATURE_VALID".green(),
            Some(other) => other.as_str().yellow(),
            None => "-".normal(),
        };
        println!(
            "  {:<14} {:<26} {:<14} {:<20} {:<10} {}",
            row.item_serial_code,
            row.model_name,
            row.station_name,
            row.synced_at
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            status,
            signature
        );
    }
    println!();
    println!("{} {}", "Pending sync:".bright_cyan(), pending.to_string().bright_yellow());
}

pub fn print_catalog(catalog: &[DeviceDefinition]) {
    for definition in catalog {
        println!(
            "  {:<24} {:<8} {:<28} {}",
            definition.device_code,
            or_dash(&definition.device_type_code),
            definition.device_type_name,
            or_dash(&definition.sequence_number)
        );
    }
    println!("{} definition(s)", catalog.len());
}

pub fn print_terminals(terminals: &[TargetTerminal]) {
    for terminal in terminals {
        println!(
            "  {:<38} {:<28} {:<6} {} device(s)",
            terminal.id,
            terminal.label(),
            or_dash(&terminal.terminal_type),
            terminal.devices.len()
        );
    }
    println!("{} free terminal(s)", terminals.len());
}
