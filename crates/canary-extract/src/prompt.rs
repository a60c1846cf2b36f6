use std::sync::OnceLock;

use canary_ticket::Ticket;
use regex::Regex;

use crate::generator::UserContent;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert technical support engineer triaging helpdesk tickets. \
Read the ticket and reply with a JSON object with exactly three keys: \
\"problem_summary\" (a short, clear summary of the user's problem), \
\"suggested_solution\" (a likely fix or the steps to reach one) and \
\"action_items\" (an array of short, concrete next steps for the support team). \
If the ticket is not a technical support request, set \"problem_summary\" to an empty string. \
Do not add any text outside the JSON object.";

fn html_tag_regex() -> &'static Regex {
    static HTML_TAG_RE: OnceLock<Regex> = OnceLock::new();
    HTML_TAG_RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid html tag regex"))
}

/// Builds the user payload sent alongside the system prompt.
pub fn build_user_content(ticket: &Ticket, max_content_chars: usize, max_image_refs: usize) -> UserContent {
    let mut lines = vec![format!("Title: {}", ticket.title())];
    if let Some(customer) = ticket.customer_name() {
        lines.push(format!("Customer: {customer}"));
    }
    if let Some(contact) = ticket.contact_name() {
        lines.push(format!("Contact: {contact}"));
    }
    if let Some(created_at) = ticket.created_at() {
        lines.push(format!("Created at: {}", created_at.to_rfc3339()));
    }
    let content = ticket
        .body()
        .map(str::to_string)
        .or_else(|| ticket.rich_body().map(strip_html))
        .unwrap_or_default();
    lines.push(format!(
        "Content: {}",
        truncate_for_prompt(content.trim(), max_content_chars)
    ));

    let mut image_refs = ticket.image_refs();
    image_refs.truncate(max_image_refs);
    UserContent {
        text: lines.join("\n"),
        image_refs,
    }
}

fn strip_html(markup: &str) -> String {
    let stripped = html_tag_regex().replace_all(markup, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    if max_chars == 1 {
        return "…".to_string();
    }

    let truncate_at = text
        .char_indices()
        .nth(max_chars - 1)
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    let mut truncated = text[..truncate_at].to_string();
    truncated.push('…');
    truncated
}
