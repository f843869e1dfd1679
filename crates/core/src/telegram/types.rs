//! Wire types for the handful of Bot API objects the bot touches.
//! Everything Telegram sends that the bot does not use is simply ignored.

use serde::{Deserialize, Serialize};

/// An inbound event delivered to the webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(rename = "update_id")]
    pub id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// What an update asks the bot to do.
#[derive(Debug)]
pub enum UpdateKind<'a> {
    /// `/start`, `/help` and friends.
    Command(&'a Message),
    /// A plain text message: a movie-title query.
    Message(&'a Message),
    /// The user edited an earlier query.
    EditedMessage(&'a Message),
    /// An inline keyboard button was pressed.
    Callback(&'a CallbackQuery),
    Unknown,
}

impl Update {
    pub fn kind(&self) -> UpdateKind<'_> {
        if let Some(message) = &self.message {
            if message
                .entities
                .first()
                .is_some_and(|entity| entity.kind == "bot_command")
            {
                return UpdateKind::Command(message);
            }
            return UpdateKind::Message(message);
        }
        if let Some(message) = &self.edited_message {
            return UpdateKind::EditedMessage(message);
        }
        if let Some(callback) = &self.callback_query {
            return UpdateKind::Callback(callback);
        }
        UpdateKind::Unknown
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: i64,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub chat: Chat,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: i64,
    /// IETF tag of the user's client language, e.g. "ru".
    #[serde(default, rename = "language_code")]
    pub lang_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    /// The payload of the pressed button: a catalog detail id.
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

/// Payload of `editMessageMedia` pointing at an uploaded photo part.
#[derive(Debug, Clone, Serialize)]
pub struct InputMediaPhoto {
    #[serde(rename = "type")]
    pub kind: String,
    pub media: String,
    pub caption: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookInfo {
    pub url: String,
    #[serde(default)]
    pub has_custom_certificate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_updates_are_detected_by_entity() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 1,
                    "from": {"id": 5, "language_code": "ru"},
                    "chat": {"id": 5},
                    "text": "/start",
                    "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
                }
            }"#,
        )
        .unwrap();
        assert!(matches!(update.kind(), UpdateKind::Command(_)));
    }

    #[test]
    fn plain_text_is_a_query_message() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 11,
                "message": {
                    "message_id": 2,
                    "chat": {"id": 5},
                    "text": "lion king"
                }
            }"#,
        )
        .unwrap();
        match update.kind() {
            UpdateKind::Message(message) => assert_eq!(message.text, "lion king"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn edited_messages_are_distinguished() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 12,
                "edited_message": {
                    "message_id": 3,
                    "chat": {"id": 5},
                    "text": "lion kings"
                }
            }"#,
        )
        .unwrap();
        assert!(matches!(update.kind(), UpdateKind::EditedMessage(_)));
    }

    #[test]
    fn callback_updates_carry_the_button_payload() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 13,
                "callback_query": {
                    "id": "abc",
                    "data": "42",
                    "message": {
                        "message_id": 4,
                        "chat": {"id": 5},
                        "reply_markup": {"inline_keyboard": [[
                            {"text": "- 1 -", "callback_data": "42"},
                            {"text": "2", "callback_data": "43"}
                        ]]}
                    }
                }
            }"#,
        )
        .unwrap();
        match update.kind() {
            UpdateKind::Callback(callback) => {
                assert_eq!(callback.data, "42");
                let markup = callback.message.as_ref().unwrap().reply_markup.as_ref().unwrap();
                assert_eq!(markup.inline_keyboard[0].len(), 2);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn empty_update_is_unknown() {
        let update: Update = serde_json::from_str(r#"{"update_id": 14}"#).unwrap();
        assert!(matches!(update.kind(), UpdateKind::Unknown));
    }

    #[test]
    fn webhook_info_reads_certificate_flag() {
        let info: WebhookInfo = serde_json::from_str(
            r#"{
                "url": "https://bot.example.org:8443/TOKEN",
                "has_custom_certificate": true,
                "pending_update_count": 0
            }"#,
        )
        .unwrap();
        assert_eq!(info.url, "https://bot.example.org:8443/TOKEN");
        assert!(info.has_custom_certificate);

        // An unset webhook comes back with an empty url and no flag.
        let info: WebhookInfo = serde_json::from_str(r#"{"url": ""}"#).unwrap();
        assert!(info.url.is_empty());
        assert!(!info.has_custom_certificate);
    }
}
