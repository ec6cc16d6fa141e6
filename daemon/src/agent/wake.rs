//! Wake phrase matching

/// Wake phrase and its phonetic variants, matched on whole tokens
#[derive(Debug, Clone)]
pub struct WakeWord {
    phrases: Vec<Vec<String>>,
}

impl WakeWord {
    pub fn new(phrase: &str, variants: &[String]) -> Self {
        let phrases = std::iter::once(phrase)
            .chain(variants.iter().map(String::as_str))
            .map(tokenize)
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Self { phrases }
    }

    /// True when any phrase appears as a contiguous token sequence
    ///
    /// "hey echo" matches `echo`; "echol" does not.
    pub fn matches(&self, transcript: &str) -> bool {
        let tokens = tokenize(transcript);
        self.phrases.iter().any(|phrase| {
            tokens
                .windows(phrase.len())
                .any(|window| window == phrase.as_slice())
        })
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_wake() -> WakeWord {
        WakeWord::new("echo", &["eco".to_string(), "ecko".to_string()])
    }

    #[test]
    fn test_accepts_phrase_and_variants() {
        let wake = default_wake();
        assert!(wake.matches("echo"));
        assert!(wake.matches("Eco"));
        assert!(wake.matches("ecko"));
        assert!(wake.matches("hey echo, are you there?"));
    }

    #[test]
    fn test_rejects_partial_tokens() {
        let wake = default_wake();
        assert!(!wake.matches("echol"));
        assert!(!wake.matches("economy"));
        assert!(!wake.matches(""));
    }

    #[test]
    fn test_multi_word_phrase() {
        let wake = WakeWord::new("hey computer", &[]);
        assert!(wake.matches("okay Hey Computer open mail"));
        assert!(!wake.matches("computer hey"));
    }
}
