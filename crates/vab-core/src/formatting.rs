//! Formatting utilities for Telegram MarkdownV2 messages.

use crate::domain::Phase;

/// Characters that are markup-significant in MarkdownV2.
pub const RESERVED_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub const TRUNCATION_MARKER: &str = "…";

/// Escape every MarkdownV2 reserved character with a backslash.
///
/// Purely mechanical: not idempotent, and it does not look at context.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if RESERVED_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fit a message into the transport ceiling.
///
/// Over-long text is cut at the last line break within `limit - 5` chars and
/// ends with a newline plus [`TRUNCATION_MARKER`]. Markup may be left unbalanced.
pub fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let cut = limit.saturating_sub(5);
    let head: String = text.chars().take(cut).collect();
    let head = match head.rfind('\n') {
        Some(i) if i > 0 => &head[..i],
        _ => head.as_str(),
    };
    format!("{head}\n{TRUNCATION_MARKER}")
}

/// `08:12:48` → `08h 12m`.
pub fn time_left_hm(time_left: &str) -> String {
    let mut parts = time_left.split(':');
    let h = parts.next().unwrap_or("00");
    let m = parts.next().unwrap_or("00");
    format!("{h}h {m}m")
}

/// `"s"` when `n != 1`.
pub fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Verb suffix for third-person singular ("end" / "ends").
pub fn verb_s(n: usize) -> &'static str {
    if n == 1 {
        "s"
    } else {
        ""
    }
}

/// Glyphs used in messages and on menu buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Icon {
    Dead,
    Ending,
    Interest,
    Attention,
    Simple,
    NewEntry,
    NoQuorum,
    Expiring,
    Informal,
    Formal,
    Digest,
    Completed,
    Alert,
    Discussions,
    Settings,
    Proposal,
    Home,
    Off,
    Time,
}

impl Icon {
    pub fn glyph(self) -> &'static str {
        match self {
            Icon::Dead => "☠️",
            Icon::Ending => "⏳",
            Icon::Interest => "👀",
            Icon::Attention => "⚠",
            Icon::Simple => "🕓",
            Icon::NewEntry => "📩",
            Icon::NoQuorum => "🔥",
            Icon::Expiring => "⌛",
            Icon::Informal => "🟦",
            Icon::Formal => "🟩",
            Icon::Digest => "📋",
            Icon::Completed => "✅",
            Icon::Alert => "📣",
            Icon::Discussions => "💬",
            Icon::Settings => "⚙️",
            Icon::Proposal => "🔎",
            Icon::Home => "🏠",
            Icon::Off => "⭕",
            Icon::Time => "⏰",
        }
    }

    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Informal => Icon::Informal,
            Phase::Formal => Icon::Formal,
        }
    }
}
