//! Speech double.

use async_trait::async_trait;
use brain_core::{BrainError, Speech};

/// Speech service with canned results.
///
/// `None` for either side makes that operation fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSpeech {
    transcript: Option<String>,
    audio: Option<Vec<u8>>,
}

impl ScriptedSpeech {
    pub fn new(transcript: Option<&str>, audio: Option<Vec<u8>>) -> Self {
        Self {
            transcript: transcript.map(str::to_string),
            audio,
        }
    }

    /// Transcribes to `transcript`; synthesis fails.
    pub fn transcribing(transcript: &str) -> Self {
        Self::new(Some(transcript), None)
    }

    /// Both directions fail.
    pub fn broken() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Speech for ScriptedSpeech {
    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _mime_type: &str,
        _language: &str,
    ) -> Result<String, BrainError> {
        self.transcript
            .clone()
            .ok_or_else(|| BrainError::ProcessingFailed("no speech recognized".to_string()))
    }

    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>, BrainError> {
        self.audio
            .clone()
            .ok_or_else(|| BrainError::Unavailable("synthesis disabled".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_speech() {
        let speech = ScriptedSpeech::new(Some("hello"), Some(vec![1, 2, 3]));
        assert_eq!(speech.transcribe(vec![], "audio/ogg", "en-US").await.unwrap(), "hello");
        assert_eq!(speech.synthesize("hi", "en-US").await.unwrap(), vec![1, 2, 3]);

        let broken = ScriptedSpeech::broken();
        assert!(broken.transcribe(vec![], "audio/ogg", "en-US").await.is_err());
        assert!(broken.synthesize("hi", "en-US").await.is_err());
    }
}
