//! Webhook payload types.

pub mod telegram;
pub mod whatsapp;

pub use telegram::{CallbackQuery, TelegramChat, TelegramFile, TelegramMessage, TelegramUser, Update};
pub use whatsapp::{
    WebhookPayload, WhatsAppContact, WhatsAppMedia, WhatsAppMessage, WhatsAppStatus, WhatsAppValue,
};
