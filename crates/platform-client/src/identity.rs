//! Canonical sender identities.
//!
//! WhatsApp users are keyed by their phone number as digits only, with
//! country code. Telegram users are keyed by `tg_{chat_id}`.

const TELEGRAM_PREFIX: &str = "tg_";

/// Normalize a WhatsApp phone number to digits with country code.
///
/// Formatting characters and a leading `+` or `00` are dropped. A local
/// number (leading `0`) gets `default_country_code` when one is configured.
/// Returns `None` if no digits remain.
pub fn whatsapp_sender_key(raw: &str, default_country_code: Option<&str>) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let digits = if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if let (Some(rest), Some(cc)) = (digits.strip_prefix('0'), default_country_code) {
        format!("{}{}", cc.trim_start_matches('+'), rest)
    } else {
        digits
    };

    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Sender key for a Telegram chat.
pub fn telegram_sender_key(chat_id: i64) -> String {
    format!("{}{}", TELEGRAM_PREFIX, chat_id)
}

/// Chat ID encoded in a Telegram sender key.
pub fn telegram_chat_id(sender_key: &str) -> Option<&str> {
    sender_key.strip_prefix(TELEGRAM_PREFIX)
}
