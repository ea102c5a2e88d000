//! Legacy transcript format.
//!
//! One markdown file per agent: a header, then one `## Turn` section per
//! turn, and a `## Closed` footer once the session is reset. Body lines that
//! start with `#` or `\` are escaped with a leading backslash so user text can
//! never be mistaken for a section boundary.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::ConversationTurn;

pub const TRANSCRIPT_TITLE: &str = "# Conversation transcript";
const TURN_HEADING: &str = "## Turn";
const CLOSED_HEADING: &str = "## Closed";
const USER_HEADING: &str = "### User";
const ASSISTANT_HEADING: &str = "### Assistant";

/// RFC 3339 with milliseconds and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn escape_body(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with('#') || line.starts_with('\\') {
                format!("\\{}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_line(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}

/// Header written when the transcript file is created.
pub fn render_header(started_at: &DateTime<Utc>) -> String {
    format!("{}\nstarted_at: {}\n\n", TRANSCRIPT_TITLE, format_timestamp(started_at))
}

/// One appended turn block. Texts must already be sanitized.
pub fn render_turn(turn: &ConversationTurn) -> String {
    format!(
        "{}\ntimestamp: {}\nmessage_id: {}\nsource: {}\n\n{}\n{}\n\n{}\n{}\n\n",
        TURN_HEADING,
        format_timestamp(&turn.timestamp_utc),
        turn.message_id,
        if turn.is_internal { "internal" } else { "external" },
        USER_HEADING,
        escape_body(&turn.user_text),
        ASSISTANT_HEADING,
        escape_body(&turn.assistant_text),
    )
}

/// Footer appended when the session is closed.
pub fn render_footer(closed_at: &DateTime<Utc>) -> String {
    format!("{}\nclosed_at: {}\n", CLOSED_HEADING, format_timestamp(closed_at))
}

/// Filesystem-safe timestamp used for archive names (`20261016T101500123Z`).
pub fn safe_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

#[derive(Default)]
struct TurnDraft {
    timestamp: Option<String>,
    message_id: String,
    internal: bool,
    user: Vec<String>,
    assistant: Vec<String>,
}

#[derive(PartialEq)]
enum Section {
    Outside,
    Header,
    User,
    Assistant,
}

impl TurnDraft {
    fn finish(self) -> Option<ConversationTurn> {
        let timestamp_utc = DateTime::parse_from_rfc3339(self.timestamp?.trim())
            .ok()?
            .with_timezone(&Utc);
        Some(ConversationTurn {
            message_id: self.message_id,
            timestamp_utc,
            user_text: self.user.join("\n").trim_end_matches('\n').to_string(),
            assistant_text: self.assistant.join("\n").trim_end_matches('\n').to_string(),
            is_internal: self.internal,
        })
    }
}

/// Parses transcript content into turns, in file order.
///
/// Sections without a parseable timestamp are dropped. Content that is not a
/// transcript at all yields no turns.
pub fn parse_turns(content: &str) -> Vec<ConversationTurn> {
    let mut turns = Vec::new();
    let mut draft: Option<TurnDraft> = None;
    let mut section = Section::Outside;

    for line in content.split('\n') {
        let trimmed = line.trim_end_matches('\r');
        if trimmed == TURN_HEADING || trimmed == CLOSED_HEADING {
            if let Some(done) = draft.take().and_then(TurnDraft::finish) {
                turns.push(done);
            }
            if trimmed == TURN_HEADING {
                draft = Some(TurnDraft::default());
                section = Section::Header;
            } else {
                section = Section::Outside;
            }
            continue;
        }

        let Some(current) = draft.as_mut() else {
            continue;
        };
        match section {
            Section::Outside => {}
            Section::Header => {
                if trimmed == USER_HEADING {
                    section = Section::User;
                } else if let Some(value) = trimmed.strip_prefix("timestamp:") {
                    current.timestamp = Some(value.trim().to_string());
                } else if let Some(value) = trimmed.strip_prefix("message_id:") {
                    current.message_id = value.trim().to_string();
                } else if let Some(value) = trimmed.strip_prefix("source:") {
                    current.internal = value.trim() == "internal";
                }
            }
            Section::User => {
                if trimmed == ASSISTANT_HEADING {
                    section = Section::Assistant;
                } else {
                    current.user.push(unescape_line(trimmed).to_string());
                }
            }
            Section::Assistant => current.assistant.push(unescape_line(trimmed).to_string()),
        }
    }

    if let Some(done) = draft.and_then(TurnDraft::finish) {
        turns.push(done);
    }
    turns
}
