//! Telegram channel: long-polls the Bot API for updates.
//!
//! Text messages and inline-button presses become `InboundEvent`s. Replies
//! are sent with HTML parse mode; presses are always answered so the client
//! stops its progress indicator.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{Channel, EventStream, InboundEvent};
use crate::error::ChannelError;
use crate::render::{Button, Keyboard, Outgoing, RenderRequest};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Default long-poll timeout for getUpdates.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram channel connected to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// POST a Bot API method and return its `result`.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| send_failed(format!("{method}: {e}")))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| send_failed(format!("{method}: invalid response: {e}")))?;

        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(send_failed(format!("{method} returned {status}: {description}")));
        }
        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a message, splitting text over Telegram's limit. The keyboard is
    /// attached to the last chunk.
    async fn send_message(&self, request: &RenderRequest) -> Result<(), ChannelError> {
        let chunks = split_message(&request.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": request.chat_id,
                "text": chunk,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            });
            if i == last {
                if let Some(markup) = reply_markup(&request.keyboard) {
                    body["reply_markup"] = markup;
                }
            }
            self.call_html_with_fallback("sendMessage", body).await?;
        }
        Ok(())
    }

    /// Replace text and buttons of an existing message.
    async fn edit_message_text(
        &self,
        message_id: i64,
        request: &RenderRequest,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": request.chat_id,
            "message_id": message_id,
            "text": request.text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Keyboard::Inline(rows) = &request.keyboard {
            body["reply_markup"] = inline_markup(rows);
        }
        self.call_html_with_fallback("editMessageText", body).await
    }

    async fn edit_message_buttons(
        &self,
        chat_id: i64,
        message_id: i64,
        buttons: &[Vec<Button>],
    ) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": inline_markup(buttons),
        });
        self.call("editMessageReplyMarkup", &body).await.map(|_| ())
    }

    async fn answer_callback(
        &self,
        callback_query_id: &str,
        notice: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = notice {
            body["text"] = Value::String(text.to_string());
        }
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }

    /// Try HTML first; if Telegram rejects the markup, retry as plain text.
    async fn call_html_with_fallback(&self, method: &str, body: Value) -> Result<(), ChannelError> {
        let html_err = match self.call(method, &body).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        tracing::warn!(
            method,
            error = %html_err,
            "Telegram rejected HTML message; retrying without parse_mode"
        );

        let mut plain = body;
        if let Some(obj) = plain.as_object_mut() {
            obj.remove("parse_mode");
        }
        self.call(method, &plain).await.map(|_| ())
    }

    /// Deliver one reply. Edits fall back to a fresh message when the
    /// original can't be edited.
    async fn deliver(&self, message_id: Option<i64>, reply: &Outgoing) -> Result<(), ChannelError> {
        match reply {
            Outgoing::Send(request) => self.send_message(request).await,
            Outgoing::Replace(request) => match message_id {
                Some(id) if !matches!(request.keyboard, Keyboard::Menu(_)) => {
                    if let Err(e) = self.edit_message_text(id, request).await {
                        tracing::debug!(error = %e, "Edit failed; sending a new message");
                        return self.send_message(request).await;
                    }
                    Ok(())
                }
                _ => self.send_message(request).await,
            },
            Outgoing::ReplaceButtons { chat_id, buttons } => match message_id {
                Some(id) => self.edit_message_buttons(*chat_id, id, buttons).await,
                None => Ok(()),
            },
            // Notices are delivered through answerCallbackQuery.
            Outgoing::Notice(_) => Ok(()),
        }
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let allowed_users = self.allowed_users.clone();
        let poll_timeout = self.poll_timeout_secs;
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": poll_timeout,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let results = match poll_results(&data) {
                    Ok(results) => results,
                    Err(description) => {
                        // 401 (bad token) and 409 (another poller) repeat on
                        // every call until someone intervenes.
                        tracing::warn!(description = %description, "Telegram getUpdates rejected");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        continue;
                    };

                    // Check allowlist against both username and numeric ID
                    let user_id = event.user_id.to_string();
                    let username = event
                        .metadata
                        .get("username")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    if !check_user_allowed(&allowed_users, [username, user_id.as_str()]) {
                        tracing::warn!(
                            username,
                            user_id = event.user_id,
                            "Telegram: ignoring update from unauthorized user"
                        );
                        continue;
                    }

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        event: &InboundEvent,
        replies: Vec<Outgoing>,
    ) -> Result<(), ChannelError> {
        let message_id = event.metadata.get("message_id").and_then(Value::as_i64);

        if let Some(query_id) = event
            .metadata
            .get("callback_query_id")
            .and_then(Value::as_str)
        {
            let notice = replies.iter().find_map(|r| match r {
                Outgoing::Notice(text) => Some(text.as_str()),
                _ => None,
            });
            if let Err(e) = self.answer_callback(query_id, notice).await {
                tracing::warn!(error = %e, "Failed to answer callback query");
            }
        } else {
            // No button to attach a notice to; show it as a message instead.
            for reply in &replies {
                if let Outgoing::Notice(text) = reply {
                    let request = RenderRequest::new(event.chat_id, text.as_str(), Keyboard::None);
                    self.send_message(&request).await?;
                }
            }
        }

        for reply in &replies {
            self.deliver(message_id, reply).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Updates from a `getUpdates` reply, or the API's description when the
/// reply is not `ok`.
fn poll_results(data: &Value) -> Result<&[Value], String> {
    if data.get("ok").and_then(Value::as_bool) != Some(true) {
        return Err(data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description")
            .to_string());
    }
    data.get("result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| "missing result".to_string())
}

fn api_url(token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        token.expose_secret()
    )
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason,
    }
}

/// Display handle for a Telegram user object: `@username`, else full name.
fn display_handle(from: &Value) -> String {
    if let Some(username) = from.get("username").and_then(Value::as_str) {
        return format!("@{username}");
    }
    let first = from.get("first_name").and_then(Value::as_str).unwrap_or("");
    let last = from.get("last_name").and_then(Value::as_str).unwrap_or("");
    format!("{first} {last}").trim().to_string()
}

/// Convert one `getUpdates` entry into an event. Updates that are neither
/// a text message nor a button press yield `None`.
fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let from = message.get("from")?;
        let user_id = from.get("id").and_then(Value::as_i64)?;
        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)?;
        let username = from.get("username").and_then(Value::as_str);

        return Some(
            InboundEvent::text("telegram", user_id, chat_id, text)
                .with_handle(display_handle(from))
                .with_metadata(json!({
                    "message_id": message.get("message_id").and_then(Value::as_i64),
                    "username": username,
                })),
        );
    }

    let query = update.get("callback_query")?;
    let query_id = query.get("id").and_then(Value::as_str)?;
    let data = query.get("data").and_then(Value::as_str)?;
    let from = query.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?;
    let message = query.get("message");
    // Private chats share the user's id when the original message is gone.
    let chat_id = message
        .and_then(|m| m.get("chat"))
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .unwrap_or(user_id);
    let username = from.get("username").and_then(Value::as_str);

    Some(
        InboundEvent::button("telegram", user_id, chat_id, data)
            .with_handle(display_handle(from))
            .with_metadata(json!({
                "callback_query_id": query_id,
                "message_id": message.and_then(|m| m.get("message_id")).and_then(Value::as_i64),
                "username": username,
            })),
    )
}

fn inline_markup(rows: &[Vec<Button>]) -> Value {
    let keyboard: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| json!({ "text": b.label, "callback_data": b.payload.to_string() }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": keyboard })
}

/// `reply_markup` for a keyboard, or `None` to leave the current one.
fn reply_markup(keyboard: &Keyboard) -> Option<Value> {
    match keyboard {
        Keyboard::None => None,
        Keyboard::Menu(rows) => {
            let keyboard: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
                .collect();
            Some(json!({ "keyboard": keyboard, "resize_keyboard": true }))
        }
        Keyboard::Inline(rows) => Some(inline_markup(rows)),
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char
/// boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::EventKind;
    use crate::conversation::payload::Payload;

    fn channel(allowed: Vec<String>) -> TelegramChannel {
        TelegramChannel::new(SecretString::from("123:ABC"), allowed)
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel(vec!["*".into()]).name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel(vec![]).api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    // ── User allowlist tests ────────────────────────────────────────

    fn allowed(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn telegram_user_allowed_wildcard() {
        assert!(check_user_allowed(&allowed(&["*"]), ["anyone"]));
    }

    #[test]
    fn telegram_user_allowed_specific() {
        let list = allowed(&["alice", "bob"]);
        assert!(check_user_allowed(&list, ["alice"]));
        assert!(!check_user_allowed(&list, ["eve"]));
    }

    #[test]
    fn telegram_user_denied_empty() {
        assert!(!check_user_allowed(&[], ["anyone"]));
    }

    #[test]
    fn telegram_user_exact_match_not_substring() {
        let list = allowed(&["alice"]);
        assert!(!check_user_allowed(&list, ["alice_bot"]));
        assert!(!check_user_allowed(&list, ["malice"]));
    }

    #[test]
    fn telegram_user_allowed_by_numeric_id_identity() {
        assert!(check_user_allowed(
            &allowed(&["123456789"]),
            ["unknown", "123456789"]
        ));
    }

    #[test]
    fn telegram_user_denied_when_none_of_identities_match() {
        let list = allowed(&["alice", "987654321"]);
        assert!(!check_user_allowed(&list, ["unknown", "123456789"]));
    }

    // ── getUpdates replies ──────────────────────────────────────────

    #[test]
    fn poll_results_returns_updates() {
        let data = json!({ "ok": true, "result": [{ "update_id": 7 }] });
        let results = poll_results(&data).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["update_id"], 7);
    }

    #[test]
    fn poll_results_surfaces_api_rejection() {
        let data = json!({
            "ok": false,
            "error_code": 409,
            "description": "Conflict: terminated by other getUpdates request"
        });
        assert_eq!(
            poll_results(&data).unwrap_err(),
            "Conflict: terminated by other getUpdates request"
        );

        let unauthorized = json!({ "ok": false, "error_code": 401 });
        assert_eq!(poll_results(&unauthorized).unwrap_err(), "no description");
    }

    #[test]
    fn poll_results_requires_result_array() {
        assert!(poll_results(&json!({ "ok": true })).is_err());
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parses_text_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 55,
                "from": { "id": 42, "username": "ann", "first_name": "Ann" },
                "chat": { "id": 4242 },
                "text": "/start"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.user_id, 42);
        assert_eq!(event.chat_id, 4242);
        assert_eq!(event.handle, "@ann");
        assert_eq!(
            event.kind,
            EventKind::TextMessage {
                text: "/start".into()
            }
        );
        assert_eq!(event.metadata["message_id"], 55);
        assert!(event.metadata.get("callback_query_id").is_none());
    }

    #[test]
    fn parses_callback_query() {
        let update = json!({
            "update_id": 2,
            "callback_query": {
                "id": "cbq-1",
                "from": { "id": 42, "first_name": "Ann", "last_name": "Lee" },
                "message": { "message_id": 77, "chat": { "id": 4242 } },
                "data": "fav:add:7"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.handle, "Ann Lee");
        assert_eq!(event.chat_id, 4242);
        assert_eq!(
            event.kind,
            EventKind::ButtonPress {
                callback_data: "fav:add:7".into()
            }
        );
        assert_eq!(event.metadata["callback_query_id"], "cbq-1");
        assert_eq!(event.metadata["message_id"], 77);
    }

    #[test]
    fn ignores_non_text_updates() {
        let sticker = json!({
            "update_id": 3,
            "message": {
                "message_id": 1,
                "from": { "id": 1 },
                "chat": { "id": 1 },
                "sticker": {}
            }
        });
        assert!(parse_update(&sticker).is_none());
        assert!(parse_update(&json!({ "update_id": 4, "edited_message": {} })).is_none());
    }

    // ── Markup ──────────────────────────────────────────────────────

    #[test]
    fn inline_markup_encodes_payloads() {
        let rows = vec![vec![Button::new("Sound", Payload::Department(1))]];
        let markup = reply_markup(&Keyboard::Inline(rows)).unwrap();
        assert_eq!(markup["inline_keyboard"][0][0]["text"], "Sound");
        assert_eq!(markup["inline_keyboard"][0][0]["callback_data"], "dept:1");
    }

    #[test]
    fn menu_markup_is_reply_keyboard() {
        let markup = reply_markup(&Keyboard::Menu(vec![vec!["⭐ Favorites".into()]])).unwrap();
        assert_eq!(markup["keyboard"][0][0]["text"], "⭐ Favorites");
        assert_eq!(markup["resize_keyboard"], true);
        assert!(reply_markup(&Keyboard::None).is_none());
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        let msg = "é".repeat(3000);
        let chunks = split_message(&msg, 4095);
        assert!(chunks.iter().all(|c| c.len() <= 4095));
        assert_eq!(chunks.concat(), msg);
    }

    // ── Network failure surfaces as SendFailed ──────────────────────

    #[tokio::test]
    async fn send_to_unreachable_api_fails() {
        let ch = TelegramChannel {
            bot_token: SecretString::from("fake-token"),
            allowed_users: vec!["*".into()],
            poll_timeout_secs: 1,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_millis(200))
                .build()
                .unwrap(),
        };
        let request = RenderRequest::new(1, "hi", Keyboard::None);
        let result = ch.send_message(&request).await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));
    }
}
