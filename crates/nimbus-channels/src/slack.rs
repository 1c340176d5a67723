use async_trait::async_trait;
use nimbus_types::NotificationQueueItem;
use reqwest::Client;
use serde_json::{json, Value};

use crate::truncate::{
    truncate_chars, BUTTON_TEXT_LIMIT, BUTTON_VALUE_LIMIT, FIELD_TEXT_LIMIT, HEADER_TEXT_LIMIT,
    TEXT_LIMIT,
};
use crate::{ChannelDriver, ChannelError};

/// Applies Slack's documented field-length limits to a payload's
/// `text`/`blocks` before sending, Unicode-safely.
fn truncate_payload(payload: &Value) -> Value {
    let mut out = payload.clone();
    if let Some(text) = out.get("text").and_then(Value::as_str) {
        out["text"] = json!(truncate_chars(text, TEXT_LIMIT));
    }
    let Some(blocks) = out.get_mut("blocks").and_then(Value::as_array_mut) else {
        return out;
    };
    for block in blocks.iter_mut() {
        truncate_block(block);
    }
    out
}

fn truncate_block(block: &mut Value) {
    let block_type = block.get("type").and_then(Value::as_str).unwrap_or_default();
    if block_type == "header" {
        if let Some(text) = block.get("text").and_then(|t| t.get("text")).and_then(Value::as_str) {
            block["text"]["text"] = json!(truncate_chars(text, HEADER_TEXT_LIMIT));
        }
    }
    if let Some(fields) = block.get_mut("fields").and_then(Value::as_array_mut) {
        for field in fields.iter_mut() {
            if let Some(text) = field.get("text").and_then(Value::as_str) {
                field["text"] = json!(truncate_chars(text, FIELD_TEXT_LIMIT));
            }
        }
    }
    if let Some(elements) = block.get_mut("elements").and_then(Value::as_array_mut) {
        for element in elements.iter_mut() {
            if element.get("type").and_then(Value::as_str) != Some("button") {
                continue;
            }
            if let Some(text) = element.get("text").and_then(|t| t.get("text")).and_then(Value::as_str) {
                element["text"]["text"] = json!(truncate_chars(text, BUTTON_TEXT_LIMIT));
            }
            if let Some(value) = element.get("value").and_then(Value::as_str) {
                element["value"] = json!(truncate_chars(value, BUTTON_VALUE_LIMIT));
            }
        }
    }
}

pub struct SlackDmDriver {
    client: Client,
    bot_token: String,
}

impl SlackDmDriver {
    pub fn new(bot_token: String) -> Self {
        Self { client: Client::new(), bot_token }
    }

    async fn resolve_dm_channel(&self, slack_user_id: &str) -> Result<String, ChannelError> {
        let resp = self
            .client
            .post("https://slack.com/api/conversations.open")
            .bearer_auth(&self.bot_token)
            .json(&json!({ "users": slack_user_id }))
            .send()
            .await
            .map_err(|e| ChannelError::Transient(e.to_string()))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Transient(e.to_string()))?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let err = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
            return Err(ChannelError::Permanent(format!("conversations.open failed: {err}")));
        }
        body["channel"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChannelError::Permanent("conversations.open returned no channel id".into()))
    }

    async fn post_message(&self, channel_id: &str, payload: &Value) -> Result<(), ChannelError> {
        let mut body = truncate_payload(payload);
        body["channel"] = json!(channel_id);
        let resp = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Transient(e.to_string()))?;
        let response: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Transient(e.to_string()))?;
        if response.get("ok").and_then(Value::as_bool) != Some(true) {
            let err = response.get("error").and_then(Value::as_str).unwrap_or("unknown");
            return Err(ChannelError::Permanent(format!("chat.postMessage failed: {err}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelDriver for SlackDmDriver {
    async fn send(&self, item: &NotificationQueueItem) -> Result<(), ChannelError> {
        let slack_user_id = item
            .payload
            .get("slack_user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Permanent("payload missing slack_user_id".into()))?;
        let channel_id = self.resolve_dm_channel(slack_user_id).await?;
        self.post_message(&channel_id, &item.payload).await
    }
}

pub struct SlackChannelDriver {
    client: Client,
    bot_token: String,
}

impl SlackChannelDriver {
    pub fn new(bot_token: String) -> Self {
        Self { client: Client::new(), bot_token }
    }
}

#[async_trait]
impl ChannelDriver for SlackChannelDriver {
    async fn send(&self, item: &NotificationQueueItem) -> Result<(), ChannelError> {
        let channel_id = item
            .payload
            .get("channel_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Permanent("payload missing channel_id".into()))?
            .to_string();

        let mut body = truncate_payload(&item.payload);
        body["channel"] = json!(channel_id);
        let resp = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Transient(e.to_string()))?;
        let response: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Transient(e.to_string()))?;
        if response.get("ok").and_then(Value::as_bool) != Some(true) {
            let err = response.get("error").and_then(Value::as_str).unwrap_or("unknown");
            return Err(ChannelError::Permanent(format!("chat.postMessage failed: {err}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_payload_clips_oversized_header_and_button_text() {
        let payload = json!({
            "text": "short",
            "blocks": [
                { "type": "header", "text": { "type": "plain_text", "text": "x".repeat(200) } },
                {
                    "type": "actions",
                    "elements": [
                        { "type": "button", "text": { "type": "plain_text", "text": "y".repeat(100) }, "value": "z".repeat(10) }
                    ]
                }
            ]
        });
        let out = truncate_payload(&payload);
        let header_text = out["blocks"][0]["text"]["text"].as_str().unwrap();
        assert_eq!(header_text.chars().count(), HEADER_TEXT_LIMIT);
        let button_text = out["blocks"][1]["elements"][0]["text"]["text"].as_str().unwrap();
        assert_eq!(button_text.chars().count(), BUTTON_TEXT_LIMIT);
    }
}
