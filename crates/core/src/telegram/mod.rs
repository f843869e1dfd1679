//! Telegram Bot API client and the subset of its types the bot consumes.

mod client;
mod types;

pub use client::{candidates_keyboard, remark_keyboard, Client, EditMessageMedia, SendPhoto};
pub use types::{
    CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, InputMediaPhoto, Message,
    MessageEntity, Update, UpdateKind, User, WebhookInfo,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false`.
    #[error("Bot API error: {0}")]
    Api(String),

    #[error("failed to parse Bot API response: {0}")]
    Parse(String),
}
