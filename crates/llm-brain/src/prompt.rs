//! Prompt construction and classifier output parsing.

use brain_core::{Analysis, ReplyRequest, Sentiment};

use crate::api_types::{ChatMessage, RawAnalysis};

/// Messages for a conversational reply.
pub fn reply_messages(request: &ReplyRequest) -> Vec<ChatMessage> {
    let mut system = String::new();

    if !request.persona.trim().is_empty() {
        system.push_str(request.persona.trim());
        system.push_str("\n\n");
    }

    system.push_str(&format!(
        "Reply in {}. Keep replies short and warm, suitable for a chat message. Never mention that you are an AI model.",
        request.language
    ));

    if let Some(ref context) = request.context {
        system.push_str(&format!(
            "\n\nThe user is on day {} of the journey, \"{}\":\n{}",
            context.day_number, context.title, context.body
        ));
        if let Some(ref prompt) = context.reflection_prompt {
            system.push_str(&format!("\nToday's reflection question: {}", prompt));
        }
        system.push_str("\nGround your reply in this content where it helps.");
    }

    vec![
        ChatMessage::system(system),
        ChatMessage::user(request.message.clone()),
    ]
}

/// Messages for a JSON classification call.
pub fn classification_messages(text: &str, vocabulary: &[String]) -> Vec<ChatMessage> {
    let mut system = String::from(
        "Classify the user's message. Respond with a JSON object with keys \
         \"sentiment\" (one of \"positive\", \"negative\", \"neutral\"), \
         \"tags\" (array of short topic labels) and \"confidence\" (number between 0 and 1).",
    );

    if !vocabulary.is_empty() {
        system.push_str(&format!(
            " Choose tags only from: {}.",
            vocabulary.join(", ")
        ));
    }

    vec![ChatMessage::system(system), ChatMessage::user(text)]
}

/// Parse the model's classification output into a normalized [`Analysis`].
///
/// Accepts output wrapped in a Markdown code fence. Unknown sentiments map
/// to neutral, confidence is clamped, and tags outside a non-empty
/// vocabulary are dropped.
pub fn parse_analysis(raw: &str, vocabulary: &[String]) -> Result<Analysis, serde_json::Error> {
    let body = strip_code_fence(raw);
    let parsed: RawAnalysis = serde_json::from_str(body)?;

    let sentiment = parsed
        .sentiment
        .as_deref()
        .map(Sentiment::from_lenient)
        .unwrap_or_default();

    let mut tags: Vec<String> = Vec::new();
    for tag in parsed.tags {
        let tag = tag.trim().to_string();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if !vocabulary.is_empty() && !vocabulary.iter().any(|v| v.eq_ignore_ascii_case(&tag)) {
            continue;
        }
        tags.push(tag);
    }

    Ok(Analysis::new(sentiment, tags, parsed.confidence.unwrap_or(0.5)))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::DayContext;

    #[test]
    fn test_parse_plain_json() {
        let analysis =
            parse_analysis(r#"{"sentiment":"Negative","tags":["Doubt"],"confidence":0.8}"#, &[]).unwrap();
        assert_eq!(analysis.sentiment, Sentiment::Negative);
        assert_eq!(analysis.tags, vec!["Doubt".to_string()]);
        assert_eq!(analysis.confidence, 0.8);
    }

    #[test]
    fn test_parse_fenced_and_clamped() {
        let raw = "```json\n{\"sentiment\":\"ecstatic\",\"tags\":[\"Hope\",\"Hope\",\" \"],\"confidence\":3}\n```";
        let analysis = parse_analysis(raw, &[]).unwrap();
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
        assert_eq!(analysis.tags, vec!["Hope".to_string()]);
        assert_eq!(analysis.confidence, 1.0);
    }

    #[test]
    fn test_parse_vocabulary_filter() {
        let vocabulary = vec!["Question".to_string()];
        let analysis =
            parse_analysis(r#"{"sentiment":"neutral","tags":["Question","Weather"]}"#, &vocabulary).unwrap();
        assert_eq!(analysis.tags, vec!["Question".to_string()]);
        assert_eq!(analysis.confidence, 0.5);
    }

    #[test]
    fn test_parse_garbage_errors() {
        assert!(parse_analysis("I think it's positive", &[]).is_err());
    }

    #[test]
    fn test_reply_messages_include_context() {
        let request = ReplyRequest::general("1555", "You are a kind guide.", "Why?", "Indonesian").with_context(
            DayContext {
                day_number: 4,
                title: "Forgiveness".to_string(),
                body: "Today we read about forgiveness.".to_string(),
                reflection_prompt: Some("Who do you need to forgive?".to_string()),
            },
        );

        let messages = reply_messages(&request);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("You are a kind guide."));
        assert!(messages[0].content.contains("Reply in Indonesian"));
        assert!(messages[0].content.contains("day 4"));
        assert!(messages[0].content.contains("Who do you need to forgive?"));
        assert_eq!(messages[1].content, "Why?");
    }
}
