use anyhow::Context;
use chrono::DateTime;
use google_gmail1::api::Message;
use mail_parser::MessageParser;
use regex::Regex;

use crate::{model::MailMessage, util::truncate_chars};

/// Upper bound of body characters kept per message.
pub const BODY_MAX_CHARS: usize = 4000;

const RE_WHITESPACE_STR: &str = r"\s+";
const RE_DIVIDERS_STR: &str = r"[-=_]{3,}";

lazy_static::lazy_static!(
    static ref RE_WHITESPACE: Regex = Regex::new(RE_WHITESPACE_STR).unwrap();
    static ref RE_DIVIDERS: Regex = Regex::new(RE_DIVIDERS_STR).unwrap();
);

/// Turn a `format=raw` Gmail message into the fields classification uses.
///
/// The body is plain text with collapsed whitespace. When the MIME parts
/// yield no text the Gmail snippet stands in.
pub fn from_gmail_message(msg: &Message) -> anyhow::Result<MailMessage> {
    let id = msg.id.clone().context("Message without id")?;
    let raw = msg
        .raw
        .as_ref()
        .with_context(|| format!("No raw content in message {id}"))?;

    let (sender, subject, body) = match MessageParser::default().parse(raw) {
        Some(parsed) => {
            let sender = parsed
                .from()
                .and_then(|from| from.first())
                .map(|addr| match (addr.name(), addr.address()) {
                    (Some(name), Some(address)) => format!("{name} <{address}>"),
                    (None, Some(address)) => address.to_string(),
                    (Some(name), None) => name.to_string(),
                    (None, None) => String::new(),
                })
                .unwrap_or_default();
            let subject = parsed.subject().map(clean_text).unwrap_or_default();
            let body = parsed
                .body_text(0)
                .map(|text| html_to_text(&text))
                .unwrap_or_default();
            (sender, subject, body)
        }
        None => {
            tracing::warn!("Could not parse MIME of message {}", id);
            Default::default()
        }
    };

    let body = if body.is_empty() {
        clean_text(msg.snippet.as_deref().unwrap_or_default())
    } else {
        body
    };

    Ok(MailMessage {
        id,
        sender,
        subject,
        body: truncate_chars(&body, BODY_MAX_CHARS).to_string(),
        label_ids: msg.label_ids.clone().unwrap_or_default(),
        received_at: msg.internal_date.and_then(DateTime::from_timestamp_millis),
    })
}

fn html_to_text(text: &str) -> String {
    let text: String = html2text::from_read(text.as_bytes(), 400);
    let text = RE_DIVIDERS.replace_all(&text, " ");
    clean_text(&text)
}

fn clean_text(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}
