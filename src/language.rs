use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language of the commentary or of the video's audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en", alias = "English", alias = "english")]
    English,
    #[serde(rename = "es", alias = "Spanish", alias = "spanish", alias = "Español (Spanish)")]
    Spanish,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Español (Spanish)",
        }
    }

    /// Locale handed to the local speech recognizer.
    pub fn locale(self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Spanish => "es-ES",
        }
    }

    /// The language a chunk is retried in when it was not understood.
    pub fn other(self) -> Language {
        match self {
            Language::English => Language::Spanish,
            Language::Spanish => Language::English,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "es" | "spanish" | "español" | "español (spanish)" => Ok(Language::Spanish),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_display_names() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::English);
        assert_eq!("ES".parse::<Language>().unwrap(), Language::Spanish);
        assert_eq!(
            "Español (Spanish)".parse::<Language>().unwrap(),
            Language::Spanish
        );
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn fallback_language_flips() {
        assert_eq!(Language::English.other(), Language::Spanish);
        assert_eq!(Language::Spanish.other(), Language::English);
    }

    #[test]
    fn deserializes_from_json_code() {
        let lang: Language = serde_json::from_str("\"es\"").unwrap();
        assert_eq!(lang, Language::Spanish);
        assert_eq!(serde_json::to_string(&Language::English).unwrap(), "\"en\"");
    }
}
