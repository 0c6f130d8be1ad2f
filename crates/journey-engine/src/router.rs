//! Command routing.
//!
//! Pure functions: the router decides, handlers act.

use database::User;

/// Fixed command keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Help,
    Human,
}

impl Command {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "START" => Some(Command::Start),
            "STOP" => Some(Command::Stop),
            "HELP" => Some(Command::Help),
            "HUMAN" => Some(Command::Human),
            _ => None,
        }
    }
}

/// First routing decision for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Command(Command),
    /// A distress or "talk to a person" phrase.
    Handoff,
    JourneyContent,
}

/// Which conversation handler a journey message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyRoute {
    /// No user record yet.
    FirstContact,
    /// Past the final day.
    Completed,
    /// Mid-journey; replies use the day's content as context.
    Contextual,
    /// Day 1 with an existing record.
    General,
}

/// Detect a command in the first word of `text`.
///
/// Accepts a leading `/` and a Telegram `@botname` suffix.
pub fn detect_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let word = first.strip_prefix('/').unwrap_or(first);
    let word = word.split('@').next().unwrap_or(word);
    let word = word.trim_end_matches(|c: char| !c.is_alphanumeric());
    Command::from_word(word)
}

/// Case-insensitive handoff phrase match.
pub fn matches_handoff(text: &str, phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && lower.contains(&phrase.to_lowercase()))
}

/// Route a message: commands, then handoff phrases, then journey content.
pub fn route(text: &str, handoff_phrases: &[String]) -> Route {
    if let Some(command) = detect_command(text) {
        return Route::Command(command);
    }
    if matches_handoff(text, handoff_phrases) {
        return Route::Handoff;
    }
    Route::JourneyContent
}

/// Route journey content by the user's progress.
pub fn journey_route(user: Option<&User>, journey_length_days: i64) -> JourneyRoute {
    match user {
        None => JourneyRoute::FirstContact,
        Some(user) if user.current_day > journey_length_days => JourneyRoute::Completed,
        Some(user) if user.current_day > 1 => JourneyRoute::Contextual,
        Some(_) => JourneyRoute::General,
    }
}
