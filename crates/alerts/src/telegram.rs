//! Telegram-backed alert delivery.

use async_trait::async_trait;
use poolwatch_core::{MediaKind, SubscriberId};
use poolwatch_engine::{AlertButton, AlertPayload, AlertSink, DeliveryError};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::debug;
use url::Url;

/// Delivers alert payloads through the Telegram Bot API.
pub struct TelegramAlerter {
    bot: Bot,
}

impl TelegramAlerter {
    /// Create an alerter with the given bot token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    pub fn from_bot(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send(
        &self,
        chat: ChatId,
        payload: &AlertPayload,
        media_url: Option<Url>,
    ) -> Result<(), RequestError> {
        let markup = keyboard_for(&payload.buttons);
        match (&payload.media, media_url) {
            (Some(media), Some(file_url)) => {
                let file = InputFile::url(file_url);
                match media.kind {
                    MediaKind::Animation => {
                        let mut request = self
                            .bot
                            .send_animation(chat, file)
                            .caption(payload.text.clone())
                            .parse_mode(ParseMode::Html);
                        if let Some(kb) = markup {
                            request = request.reply_markup(kb);
                        }
                        request.await?;
                    }
                    MediaKind::Photo => {
                        let mut request = self
                            .bot
                            .send_photo(chat, file)
                            .caption(payload.text.clone())
                            .parse_mode(ParseMode::Html);
                        if let Some(kb) = markup {
                            request = request.reply_markup(kb);
                        }
                        request.await?;
                    }
                    MediaKind::Video => {
                        let mut request = self
                            .bot
                            .send_video(chat, file)
                            .caption(payload.text.clone())
                            .parse_mode(ParseMode::Html);
                        if let Some(kb) = markup {
                            request = request.reply_markup(kb);
                        }
                        request.await?;
                    }
                }
            }
            _ => {
                let mut request = self
                    .bot
                    .send_message(chat, payload.text.clone())
                    .parse_mode(ParseMode::Html);
                if let Some(kb) = markup {
                    request = request.reply_markup(kb);
                }
                request.await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramAlerter {
    async fn deliver(&self, to: SubscriberId, payload: &AlertPayload) -> Result<(), DeliveryError> {
        let chat = ChatId(to.0);
        let media_url = match &payload.media {
            Some(media) => Some(Url::parse(&media.url).map_err(|_| {
                DeliveryError::MediaRejected(format!("unparseable media url: {}", media.url))
            })?),
            None => None,
        };

        debug!(chat = to.0, has_media = payload.media.is_some(), "sending alert");
        self.send(chat, payload, media_url).await.map_err(classify)
    }
}

/// Map a Telegram API failure onto what the broadcaster should do next.
fn classify(err: RequestError) -> DeliveryError {
    match &err {
        RequestError::Api(api) => match api {
            ApiError::BotBlocked
            | ApiError::ChatNotFound
            | ApiError::GroupDeactivated
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation => DeliveryError::Gone(err.to_string()),
            ApiError::WrongFileIdOrUrl | ApiError::FailedToGetUrlContent => {
                DeliveryError::MediaRejected(err.to_string())
            }
            _ => DeliveryError::Transient(err.to_string()),
        },
        // The chat id changed under us; the old destination is dead.
        RequestError::MigrateToChatId(_) => DeliveryError::Gone(err.to_string()),
        _ => DeliveryError::Transient(err.to_string()),
    }
}

fn keyboard_for(buttons: &[AlertButton]) -> Option<InlineKeyboardMarkup> {
    let row: Vec<InlineKeyboardButton> = buttons
        .iter()
        .filter_map(|button| {
            Url::parse(&button.url)
                .ok()
                .map(|url| InlineKeyboardButton::url(button.label.clone(), url))
        })
        .collect();
    if row.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(vec![row]))
    }
}
