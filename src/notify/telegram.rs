//! Telegram delivery via the Bot HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Listing, TelegramConfig};
use crate::notify::ListingSink;

const API_BASE: &str = "https://api.telegram.org";

/// Characters the Bot API requires escaped in MarkdownV2 text.
const MARKDOWN_V2_RESERVED: [char; 18] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

/// Sends one MarkdownV2 message per listing to every configured chat.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_ids: Vec<i64>,
}

impl TelegramNotifier {
    pub fn new(client: Client, config: &TelegramConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(AppError::config("telegram.token is empty"));
        }
        if config.chat_ids.is_empty() {
            return Err(AppError::config("telegram.chat_ids is empty"));
        }
        Ok(Self {
            client,
            token: config.token.clone(),
            chat_ids: config.chat_ids.clone(),
        })
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{API_BASE}/bot{}/sendMessage", self.token);
        for chat_id in &self.chat_ids {
            let response = self
                .client
                .post(&url)
                .json(&SendMessage {
                    chat_id: *chat_id,
                    text,
                    parse_mode: "MarkdownV2",
                })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::notify(format!(
                    "sendMessage failed with {status}: {body}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ListingSink for TelegramNotifier {
    async fn deliver(&self, listings: &[Listing]) -> Result<()> {
        for listing in listings {
            self.send(&format_listing(listing)).await?;
        }
        Ok(())
    }
}

/// Escape MarkdownV2 reserved characters.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// One bold-keyed message line.
fn field(key: &str, value: &str) -> String {
    format!("*{key}:* {}\n", escape(value))
}

/// Render one listing as a MarkdownV2 message.
fn format_listing(listing: &Listing) -> String {
    let description = listing.description.replace('\n', " ");

    let mut text = format!("*{}*\n", escape(&listing.url));
    text.push_str(&field("Адрес", &listing.address));
    text.push_str(&field("Цена", &format!("{}₽", listing.price)));
    text.push_str(&field("Комнат", &listing.rooms.to_string()));
    text.push_str(&field(
        "Площадь",
        &format!(
            "{:.2} м², жилая {:.2} м²",
            listing.total_area, listing.living_area
        ),
    ));
    text.push_str(&field("Этаж", &listing.floor_info));
    text.push_str(&field("Тип продажи", listing.sale_type_label()));
    text.push_str(&field("Описание", &description));
    text.push_str(&field("Телефон для связи", &listing.phone));
    text
}
