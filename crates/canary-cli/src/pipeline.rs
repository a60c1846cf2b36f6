use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use canary_core::{current_unix_timestamp_ms, ProcessedIdStore};
use canary_extract::{
    render_comment_html, render_summary_markdown, Extractor, Summary, TextGenerator,
};
use canary_ticket::{normalize_ticket_batch, Ticket, PLACEHOLDER_TICKET_ID};
use serde::Serialize;
use serde_json::Value;

use crate::CliOutputFormat;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunReport {
    pub(crate) fetched: usize,
    pub(crate) skipped_processed: usize,
    pub(crate) summarized: usize,
    pub(crate) degraded: usize,
}

#[derive(Debug, Serialize)]
struct SummaryLine<'a> {
    ticket_id: &'a str,
    title: &'a str,
    summary: &'a Summary,
}

pub(crate) fn read_ticket_payload(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ticket payload {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse ticket payload {}", path.display()))
}

/// Normalizes every record, dropping malformed ones and tickets outside `board_id`.
pub(crate) fn normalize_payload(raw: &Value, board_id: Option<&str>) -> Vec<Ticket> {
    let mut tickets = Vec::new();
    for (index, result) in normalize_ticket_batch(raw).into_iter().enumerate() {
        let ticket = match result {
            Ok(ticket) => ticket,
            Err(error) => {
                tracing::warn!(index, error = %error, "skipping malformed ticket record");
                continue;
            }
        };
        if let Some(board_id) = board_id {
            if !ticket.belongs_to_parent(board_id) {
                tracing::debug!(ticket_id = ticket.id(), board_id, "ticket outside board");
                continue;
            }
        }
        tickets.push(ticket);
    }
    tickets
}

pub(crate) fn write_normalized(tickets: &[Ticket], out: &mut dyn Write) -> Result<()> {
    for ticket in tickets {
        writeln!(out, "{}", serde_json::to_string(ticket)?)?;
    }
    Ok(())
}

/// Summarizes tickets not yet in `store`, then replaces the stored set with
/// the ids of this fetch. A fetch with no usable ids leaves the store as is.
pub(crate) fn run_pipeline(
    tickets: &[Ticket],
    store: &dyn ProcessedIdStore,
    extractor: &Extractor,
    generator: &dyn TextGenerator,
    format: CliOutputFormat,
    out: &mut dyn Write,
) -> Result<RunReport> {
    let started_ms = current_unix_timestamp_ms();
    let processed = store.load().context("failed to load processed ticket ids")?;
    let mut report = RunReport {
        fetched: tickets.len(),
        ..RunReport::default()
    };
    let mut fetched_ids = HashSet::new();

    for ticket in tickets {
        if ticket.id() != PLACEHOLDER_TICKET_ID {
            fetched_ids.insert(ticket.id().to_string());
            if processed.contains(ticket.id()) {
                report.skipped_processed += 1;
                continue;
            }
        }

        let summary = extractor.extract(ticket, generator);
        if summary.is_degraded() {
            report.degraded += 1;
            tracing::warn!(
                ticket_id = ticket.id(),
                provenance = summary.provenance.as_str(),
                "ticket summary degraded"
            );
        }
        write_summary(ticket, &summary, format, out)?;
        report.summarized += 1;
    }

    if fetched_ids.is_empty() {
        tracing::debug!("fetch carried no ticket ids; keeping stored processed ids");
    } else {
        store
            .save(&fetched_ids)
            .context("failed to persist processed ticket ids")?;
    }
    tracing::info!(
        fetched = report.fetched,
        skipped = report.skipped_processed,
        summarized = report.summarized,
        degraded = report.degraded,
        elapsed_ms = current_unix_timestamp_ms().saturating_sub(started_ms),
        "ticket run finished"
    );
    Ok(report)
}

fn write_summary(
    ticket: &Ticket,
    summary: &Summary,
    format: CliOutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        CliOutputFormat::Json => {
            let line = SummaryLine {
                ticket_id: ticket.id(),
                title: ticket.title(),
                summary,
            };
            writeln!(out, "{}", serde_json::to_string(&line)?)?;
        }
        CliOutputFormat::Html => writeln!(out, "{}", render_comment_html(summary))?,
        CliOutputFormat::Markdown => {
            writeln!(out, "{}\n", render_summary_markdown(ticket, summary))?
        }
    }
    Ok(())
}
