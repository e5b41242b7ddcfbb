//! Adapters from Telegram (teloxide) markup types to core [`Button`]s.
//!
//! Three legacy representations exist in the wild: inline keyboard markup,
//! reply keyboard markup, and a bare list of labeled buttons. All three are
//! normalized here; downstream code only ever sees the uniform `Button` type
//! with row-major coordinates.

use serde::{Deserialize, Serialize};
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup, KeyboardMarkup};

use tbcrawl_core::{Button, ButtonKind};

/// A button from the legacy bare-list representation: just a label and an
/// optional payload or url.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BareButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Closed set of remote button-layout representations. Normalized into core
/// buttons by [`extract_buttons`]; nothing downstream matches on this.
#[derive(Debug, Clone)]
pub enum RemoteMarkup {
    Inline(InlineKeyboardMarkup),
    Reply(KeyboardMarkup),
    Bare(Vec<Vec<BareButton>>),
}

/// One observed message from the remote bot: displayed text, optional button
/// markup, and media tags.
#[derive(Debug, Clone, Default)]
pub struct RemoteMessage {
    pub text: String,
    pub markup: Option<RemoteMarkup>,
    pub media_types: Vec<String>,
}

impl RemoteMessage {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
            media_types: Vec::new(),
        }
    }

    pub fn has_media(&self) -> bool {
        !self.media_types.is_empty()
    }
}

/// Uniform result of button extraction.
#[derive(Debug, Clone, Default)]
pub struct ButtonExtraction {
    pub inline_count: usize,
    pub reply_count: usize,
    /// Rows of normalized buttons, row-major, coordinates assigned by
    /// enumeration (never re-derived from text).
    pub buttons: Vec<Vec<Button>>,
}

impl ButtonExtraction {
    pub fn is_empty(&self) -> bool {
        self.inline_count == 0 && self.reply_count == 0
    }
}

/// Normalizes whatever markup the message carries into core buttons.
/// Inline buttons with a URL are classified [`ButtonKind::Url`] even though
/// they are structurally inline.
pub fn extract_buttons(message: &RemoteMessage) -> ButtonExtraction {
    let mut out = ButtonExtraction::default();
    let Some(markup) = &message.markup else {
        return out;
    };

    match markup {
        RemoteMarkup::Inline(markup) => {
            for (row, buttons) in markup.inline_keyboard.iter().enumerate() {
                let mut row_out = Vec::with_capacity(buttons.len());
                for (col, b) in buttons.iter().enumerate() {
                    let (kind, data, url) = match &b.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => {
                            (ButtonKind::Inline, Some(data.clone()), None)
                        }
                        InlineKeyboardButtonKind::Url(url) => {
                            (ButtonKind::Url, None, Some(url.to_string()))
                        }
                        // Login/web-app/switch buttons have no crawlable payload.
                        _ => (ButtonKind::Inline, None, None),
                    };
                    out.inline_count += 1;
                    row_out.push(Button {
                        text: b.text.clone(),
                        kind,
                        row,
                        col,
                        data,
                        url,
                    });
                }
                out.buttons.push(row_out);
            }
        }
        RemoteMarkup::Reply(markup) => {
            for (row, buttons) in markup.keyboard.iter().enumerate() {
                let mut row_out = Vec::with_capacity(buttons.len());
                for (col, b) in buttons.iter().enumerate() {
                    out.reply_count += 1;
                    row_out.push(Button {
                        text: b.text.clone(),
                        kind: ButtonKind::Reply,
                        row,
                        col,
                        data: None,
                        url: None,
                    });
                }
                out.buttons.push(row_out);
            }
        }
        RemoteMarkup::Bare(rows) => {
            for (row, buttons) in rows.iter().enumerate() {
                let mut row_out = Vec::with_capacity(buttons.len());
                for (col, b) in buttons.iter().enumerate() {
                    let kind = if b.url.is_some() {
                        ButtonKind::Url
                    } else {
                        ButtonKind::Inline
                    };
                    out.inline_count += 1;
                    row_out.push(Button {
                        text: b.text.clone(),
                        kind,
                        row,
                        col,
                        data: b.data.clone(),
                        url: b.url.clone(),
                    });
                }
                out.buttons.push(row_out);
            }
        }
    }
    out
}
