//! Bot language names to BCP-47 codes for the speech services.

/// Used when a bot's language is not recognized.
pub const DEFAULT_SPEECH_LANGUAGE: &str = "en-US";

/// Map a language name (or short code) to a BCP-47 code.
pub fn speech_language_code(language: &str) -> &'static str {
    match language.trim().to_lowercase().as_str() {
        "english" | "en" => "en-US",
        "indonesian" | "bahasa indonesia" | "id" => "id-ID",
        "hindi" | "hi" => "hi-IN",
        "swahili" | "kiswahili" | "sw" => "sw-KE",
        "arabic" | "ar" => "ar-SA",
        "spanish" | "español" | "es" => "es-ES",
        "french" | "français" | "fr" => "fr-FR",
        "burmese" | "myanmar" | "my" => "my-MM",
        "chinese" | "mandarin" | "zh" => "zh-CN",
        "portuguese" | "português" | "pt" => "pt-BR",
        _ => DEFAULT_SPEECH_LANGUAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_languages() {
        assert_eq!(speech_language_code("English"), "en-US");
        assert_eq!(speech_language_code("Bahasa Indonesia"), "id-ID");
        assert_eq!(speech_language_code(" hindi "), "hi-IN");
        assert_eq!(speech_language_code("Swahili"), "sw-KE");
        assert_eq!(speech_language_code("Español"), "es-ES");
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(speech_language_code("Klingon"), DEFAULT_SPEECH_LANGUAGE);
        assert_eq!(speech_language_code(""), DEFAULT_SPEECH_LANGUAGE);
    }
}
