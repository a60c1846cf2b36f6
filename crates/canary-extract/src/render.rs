use canary_ticket::Ticket;

use crate::summary::{Provenance, Summary};

/// Renders the summary as the HTML comment posted back to the ticket.
pub fn render_comment_html(summary: &Summary) -> String {
    let mut rendered = format!(
        "<b>Problem summary (AI):</b><br>{}<br><br><b>Suggested solution (AI):</b><br>{}",
        escape_html(&summary.problem_summary),
        escape_html(&summary.suggested_solution),
    );
    if !summary.action_items.is_empty() {
        rendered.push_str("<br><br><b>Action items (AI):</b><ul>");
        for item in &summary.action_items {
            rendered.push_str(&format!("<li>{}</li>", escape_html(item)));
        }
        rendered.push_str("</ul>");
    }
    rendered
}

/// Renders a markdown digest of the ticket and its summary for chat delivery.
pub fn render_summary_markdown(ticket: &Ticket, summary: &Summary) -> String {
    let mut lines = vec![format!("### Ticket {}: {}", ticket.id(), ticket.title())];
    if let Some(customer) = ticket.customer_name() {
        lines.push(format!("- Customer: {customer}"));
    }
    if let Some(contact) = ticket.contact_name() {
        lines.push(format!("- Contact: {contact}"));
    }
    if let Some(created_at) = ticket.created_at() {
        lines.push(format!(
            "- Created: {}",
            created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    lines.push(String::new());
    if summary.problem_summary.is_empty() {
        lines.push("**Summary**: out of scope for support triage".to_string());
    } else {
        lines.push(format!("**Summary**: {}", summary.problem_summary));
    }
    if !summary.suggested_solution.is_empty() {
        lines.push(format!("**Suggested solution**: {}", summary.suggested_solution));
    }
    if !summary.action_items.is_empty() {
        lines.push(String::new());
        lines.push("**Action items:**".to_string());
        for item in &summary.action_items {
            lines.push(format!("- [ ] {item}"));
        }
    }
    if summary.provenance != Provenance::SchemaValidated {
        lines.push(String::new());
        lines.push(format!("_extraction: {}_", summary.provenance.as_str()));
    }
    lines.join("\n")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("<br>"),
            other => escaped.push(other),
        }
    }
    escaped
}
