use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info, trace};

use posterbot_core::metrics;
use posterbot_core::telegram::{
    candidates_keyboard, remark_keyboard, CallbackQuery, EditMessageMedia, Message, SendPhoto,
    Update, UpdateKind,
};

use crate::state::AppState;

/// Poster candidates offered per reply (one primary, two alternatives).
const MAX_RESULTS: usize = 3;

const GREETING_RU: &str = "Отправьте мне название фильма и я покажу его постер.";
const GREETING_EN: &str = "Please send me a movie title and you will get its poster.";
const HELP_RU: &str =
    "Отправьте мне название фильма, например \"Фильм, фильм, фильм\", чтобы увидеть его постер.";
const HELP_EN: &str = "Please send me a movie title like \"Frozen\" to get its poster.";
const NO_MATCH_RU: &str = "Такого фильма я не знаю, попробуйте другое название.";
const NO_MATCH_EN: &str = "No movie matches that, please try another title.";

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let (movies, posters) = state
        .catalog_stats()
        .map(|stats| (stats.movies, stats.posters))
        .unwrap_or((0, 0));
    Json(serde_json::json!({
        "status": "ok",
        "indexed_titles": state.titles().len(),
        "movies": movies,
        "posters": posters,
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, StatusCode> {
    prometheus::TextEncoder::new()
        .encode_to_string(&state.registry().gather())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Entry point for every webhook delivery. Failures are logged and
/// swallowed: Telegram retries non-200 responses, and a reply the bot
/// could not build is not worth a retry storm.
pub async fn telegram_update(
    State(state): State<Arc<AppState>>,
    Json(update): Json<Update>,
) -> StatusCode {
    let started = Instant::now();
    info!(update_id = update.id, "telegram update received");

    match update.kind() {
        UpdateKind::Command(message) => handle_command(&state, message).await,
        UpdateKind::Message(message) => handle_query(&state, message, None).await,
        UpdateKind::EditedMessage(message) => {
            // Reply threads onto the edited message so the correction and
            // its poster stay together.
            handle_query(&state, message, Some(message.id)).await
        }
        UpdateKind::Callback(callback) => handle_callback(&state, callback).await,
        UpdateKind::Unknown => trace!(update_id = update.id, "ignoring unknown update kind"),
    }

    info!(
        update_id = update.id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "telegram update processed"
    );
    StatusCode::OK
}

fn is_russian(message: &Message) -> bool {
    message
        .from
        .as_ref()
        .map(|user| user.lang_code == "ru")
        .unwrap_or(false)
}

async fn handle_command(state: &AppState, message: &Message) {
    let russian = is_russian(message);
    let text = if message.text.starts_with("/start") {
        Some(if russian { GREETING_RU } else { GREETING_EN })
    } else if message.text.starts_with("/help") {
        Some(if russian { HELP_RU } else { HELP_EN })
    } else {
        None
    };

    if let Some(text) = text {
        if let Err(e) = state.telegram().send_message(message.chat.id, text).await {
            error!("command reply failed: {e}");
        }
    }
}

/// Answer a title query with the best-matching poster and up to two
/// alternative buttons.
async fn handle_query(state: &AppState, message: &Message, reply_to: Option<i64>) {
    let timer = metrics::QUERY_DURATION.with_label_values(&[]).start_timer();

    let matches = state.titles().best_matches(&message.text);
    let Some(top) = matches.first() else {
        metrics::QUERIES_SERVED.with_label_values(&["no_match"]).inc();
        let text = if is_russian(message) { NO_MATCH_RU } else { NO_MATCH_EN };
        if let Err(e) = state.telegram().send_message(message.chat.id, text).await {
            error!("no-match reply failed: {e}");
        }
        timer.observe_duration();
        return;
    };

    let poster = match state.poster(top.id) {
        Ok(poster) => poster,
        Err(e) => {
            error!(detail_id = top.id, "cannot fetch poster from the catalog: {e}");
            metrics::QUERIES_SERVED.with_label_values(&["no_match"]).inc();
            timer.observe_duration();
            return;
        }
    };

    let ids: Vec<i64> = matches.iter().take(MAX_RESULTS).map(|entry| entry.id).collect();
    let reply = SendPhoto {
        chat_id: message.chat.id,
        photo: poster,
        caption: top.caption(),
        reply_to_message_id: reply_to,
        keyboard: candidates_keyboard(&ids, top.id),
    };

    match state.telegram().send_photo(reply).await {
        Ok(()) => metrics::QUERIES_SERVED.with_label_values(&["match"]).inc(),
        Err(e) => error!("poster reply failed: {e}"),
    }
    timer.observe_duration();
}

/// Swap the shown poster for the candidate behind the pressed button and
/// mark that button as selected.
async fn handle_callback(state: &AppState, callback: &CallbackQuery) {
    let Some(message) = &callback.message else {
        error!("callback without the originating message");
        return;
    };

    let answer = || async {
        // Clears the progress spinner on the button even when the edit
        // itself went nowhere.
        if let Err(e) = state.telegram().answer_callback_query(&callback.id).await {
            error!("answering callback failed: {e}");
        }
    };

    let Ok(detail_id) = callback.data.parse::<i64>() else {
        error!(data = %callback.data, "callback payload is not a catalog id");
        answer().await;
        return;
    };
    let Some(entry) = state.titles().get(detail_id) else {
        error!(detail_id, "callback for a movie the index does not know");
        answer().await;
        return;
    };
    let Some(old_keyboard) = &message.reply_markup else {
        error!(detail_id, "callback message carries no keyboard");
        answer().await;
        return;
    };

    let poster = match state.poster(detail_id) {
        Ok(poster) => poster,
        Err(e) => {
            error!(detail_id, "cannot fetch poster from the catalog: {e}");
            answer().await;
            return;
        }
    };

    let edit = EditMessageMedia {
        chat_id: message.chat.id,
        message_id: message.id,
        photo: poster,
        caption: entry.caption(),
        keyboard: remark_keyboard(old_keyboard, &callback.data),
    };
    if let Err(e) = state.telegram().edit_message_media(edit).await {
        error!("poster swap failed: {e}");
    }
    answer().await;
}
