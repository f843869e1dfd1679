//! Bot API client: webhook management and poster replies.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputMediaPhoto, WebhookInfo,
};
use super::TelegramError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API client.
pub struct Client {
    token: String,
    base_url: String,
    http: reqwest::Client,
}

/// A `sendPhoto` reply: the top poster with the candidate keyboard.
pub struct SendPhoto {
    pub chat_id: i64,
    pub photo: Vec<u8>,
    pub caption: String,
    /// Set when answering an edited message, so the reply threads onto it.
    pub reply_to_message_id: Option<i64>,
    pub keyboard: InlineKeyboardMarkup,
}

/// An `editMessageMedia` reply: swap the poster in place and re-mark the
/// keyboard.
pub struct EditMessageMedia {
    pub chat_id: i64,
    pub message_id: i64,
    pub photo: Vec<u8>,
    pub caption: String,
    pub keyboard: InlineKeyboardMarkup,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

impl Client {
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            token: token.into(),
            base_url: base_url.into(),
            http,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    async fn read_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, TelegramError> {
        let body: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| TelegramError::Parse(e.to_string()))?;
        if !body.ok {
            return Err(TelegramError::Api(
                body.description.unwrap_or_else(|| "no description".to_string()),
            ));
        }
        body.result
            .ok_or_else(|| TelegramError::Parse("ok response without result".to_string()))
    }

    /// Current webhook registration, used to skip a redundant `setWebhook`.
    pub async fn get_webhook_info(&self) -> Result<WebhookInfo, TelegramError> {
        let resp = self.http.get(self.method_url("getWebhookInfo")).send().await?;
        Self::read_response(resp).await
    }

    /// Register `url` as the webhook, uploading the self-signed certificate
    /// Telegram should pin for it.
    pub async fn set_webhook(&self, url: &str, certificate: Vec<u8>) -> Result<(), TelegramError> {
        debug!(%url, "registering webhook");
        let form = Form::new()
            .text("url", url.to_string())
            .part("certificate", Part::bytes(certificate).file_name("cert.pem"));
        let resp = self
            .http
            .post(self.method_url("setWebhook"))
            .multipart(form)
            .send()
            .await?;
        Self::read_response::<serde_json::Value>(resp).await.map(|_| ())
    }

    /// Plain text message (greetings, help, "no match").
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        Self::read_response::<serde_json::Value>(resp).await.map(|_| ())
    }

    /// Clear the progress spinner on a pressed inline button.
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), TelegramError> {
        let resp = self
            .http
            .post(self.method_url("answerCallbackQuery"))
            .json(&json!({ "callback_query_id": callback_id }))
            .send()
            .await?;
        Self::read_response::<serde_json::Value>(resp).await.map(|_| ())
    }

    pub async fn send_photo(&self, photo: SendPhoto) -> Result<(), TelegramError> {
        let keyboard = serde_json::to_string(&photo.keyboard)
            .map_err(|e| TelegramError::Parse(e.to_string()))?;

        let mut form = Form::new()
            .text("chat_id", photo.chat_id.to_string())
            .part("photo", Part::bytes(photo.photo).file_name("image"))
            .text("caption", photo.caption)
            .text("reply_markup", keyboard);
        if let Some(reply_to) = photo.reply_to_message_id {
            form = form.text("reply_to_message_id", reply_to.to_string());
        }

        let resp = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        Self::read_response::<serde_json::Value>(resp).await.map(|_| ())
    }

    pub async fn edit_message_media(&self, edit: EditMessageMedia) -> Result<(), TelegramError> {
        let media = InputMediaPhoto {
            kind: "photo".to_string(),
            media: "attach://photo".to_string(),
            caption: edit.caption,
        };
        let media = serde_json::to_string(&media)
            .map_err(|e| TelegramError::Parse(e.to_string()))?;
        let keyboard = serde_json::to_string(&edit.keyboard)
            .map_err(|e| TelegramError::Parse(e.to_string()))?;

        let form = Form::new()
            .text("chat_id", edit.chat_id.to_string())
            .text("message_id", edit.message_id.to_string())
            .text("media", media)
            .part("photo", Part::bytes(edit.photo).file_name("image"))
            .text("reply_markup", keyboard);

        let resp = self
            .http
            .post(self.method_url("editMessageMedia"))
            .multipart(form)
            .send()
            .await?;
        Self::read_response::<serde_json::Value>(resp).await.map(|_| ())
    }
}

/// One-row keyboard of numbered buttons whose payloads are catalog detail
/// ids. The button for `selected` is framed as the active pick.
pub fn candidates_keyboard(ids: &[i64], selected: i64) -> InlineKeyboardMarkup {
    let buttons = ids
        .iter()
        .enumerate()
        .map(|(i, id)| InlineKeyboardButton {
            text: if *id == selected {
                format!("- {} -", i + 1)
            } else {
                format!("{}", i + 1)
            },
            callback_data: id.to_string(),
        })
        .collect();
    InlineKeyboardMarkup { inline_keyboard: vec![buttons] }
}

/// The same keyboard with the pressed button framed instead. Payloads are
/// carried over untouched.
pub fn remark_keyboard(old: &InlineKeyboardMarkup, pressed: &str) -> InlineKeyboardMarkup {
    let Some(row) = old.inline_keyboard.first() else {
        return InlineKeyboardMarkup::default();
    };
    let buttons = row
        .iter()
        .enumerate()
        .map(|(i, button)| InlineKeyboardButton {
            text: if button.callback_data == pressed {
                format!("- {} -", i + 1)
            } else {
                format!("{}", i + 1)
            },
            callback_data: button.callback_data.clone(),
        })
        .collect();
    InlineKeyboardMarkup { inline_keyboard: vec![buttons] }
}
