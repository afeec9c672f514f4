use crate::domain::error::DomainError;
use crate::domain::ports::notification_channel::{Notification, NotificationChannel};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API notifier. Destinations are numeric chat ids or
/// `@username`; usernames are resolved through the bot's recent updates, so
/// the user must have messaged the bot first.
pub struct TelegramNotifier {
    http: Client,
    bot_token: String,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String) -> Self {
        Self {
            http: Client::new(),
            bot_token,
            base_url: TELEGRAM_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, DomainError> {
        let response = self
            .http
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Delivery(format!("{method}: request failed: {e}")))?;

        let json_resp: Value = response
            .json()
            .await
            .map_err(|e| DomainError::Delivery(format!("{method}: failed to parse response: {e}")))?;

        parse_telegram_response(&json_resp, method)?;
        Ok(json_resp.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn resolve_chat_id(&self, destination: &str) -> Result<String, DomainError> {
        let Some(username) = destination.strip_prefix('@') else {
            return Ok(destination.to_string());
        };
        let updates = self.call("getUpdates", json!({ "limit": 100 })).await?;
        let chat_id = find_chat_id(&updates, username).ok_or_else(|| {
            DomainError::Delivery(format!(
                "chat id for @{username} not found in recent updates; message the bot first"
            ))
        })?;
        debug!(username, chat_id = %chat_id, "resolved telegram username");
        Ok(chat_id)
    }
}

/// Checks the `ok` field of a Bot API response.
fn parse_telegram_response(response: &Value, method: &str) -> Result<(), DomainError> {
    let ok = response.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if ok {
        return Ok(());
    }
    let error_code = response
        .get("error_code")
        .and_then(|v| v.as_i64())
        .unwrap_or(-1);
    let description = response
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error");
    let msg = format!("{method}: Telegram API error (code {error_code}): {description}");
    if error_code == 401 {
        Err(DomainError::Config(msg))
    } else {
        Err(DomainError::Delivery(msg))
    }
}

/// Newest update first; looks at messages, edits and channel posts.
fn find_chat_id(updates: &Value, username: &str) -> Option<String> {
    updates.as_array()?.iter().rev().find_map(|update| {
        let message = ["message", "edited_message", "channel_post"]
            .iter()
            .find_map(|key| update.get(*key))?;
        let chat = message.get("chat")?;
        if chat.get("username")?.as_str()? != username {
            return None;
        }
        chat.get("id")?.as_i64().map(|id| id.to_string())
    })
}

/// Backslash-escapes the characters legacy Markdown treats as entity markers,
/// so free text can never unbalance the message.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Renders the Markdown message body. Everything except our own bold labels
/// is escaped.
pub fn render_message(n: &Notification) -> String {
    let key_factors: Vec<String> = n.key_factors.iter().map(|k| escape_markdown(k)).collect();
    format!(
        "*{} vs {}* ({})\n\n*PICK:* {}\n*CONFIDENCE:* {}\n*EDGE:* {} ⚡\n*KEY:* {}",
        escape_markdown(&n.home_team),
        escape_markdown(&n.away_team),
        n.start_time.format("%b %d, %H:%M"),
        escape_markdown(&n.pick_text),
        n.confidence,
        escape_markdown(&n.edge_reason),
        key_factors.join(", "),
    )
}

#[async_trait::async_trait]
impl NotificationChannel for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, destination: &str, notification: &Notification) -> Result<(), DomainError> {
        let chat_id = self.resolve_chat_id(destination).await?;
        debug!(match_id = %notification.match_id, chat_id = %chat_id, "sending telegram message");
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": render_message(notification),
                "parse_mode": "Markdown",
            }),
        )
        .await?;
        Ok(())
    }
}
