//! Localized error text.
//!
//! Invalid-argument errors carry a message looked up from a locale bundle.
//! Missing keys (or a missing bundle) fall back to the English defaults.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use collection_literals::btree;
use serde::{Deserialize, Serialize};

/// Keys recognized in a locale bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKey {
    /// Missing or empty key.
    BlankName,
    /// Missing or invalid numeric amount or index.
    BlankNumber,
    /// Malformed query or query options.
    BlankQuery,
    /// Missing, foreign or finished session.
    BlankSession,
}

impl MessageKey {
    /// The key as it appears in a bundle file.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKey::BlankName => "blankName",
            MessageKey::BlankNumber => "blankNumber",
            MessageKey::BlankQuery => "blankQuery",
            MessageKey::BlankSession => "blankSession",
        }
    }

    fn default_text(self) -> &'static str {
        ENGLISH
            .get(self.as_str())
            .copied()
            .unwrap_or("Invalid argument.")
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in bundle languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Tr,
}

impl Language {
    /// Parse a language code, case-insensitively. Unknown codes fall back to English.
    pub fn from_code(code: &str) -> Language {
        match code.to_ascii_lowercase().as_str() {
            "tr" => Language::Tr,
            "en" => Language::En,
            other => {
                tracing::warn!(language = other, "unknown language, falling back to en");
                Language::En
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Tr => "tr",
        }
    }
}

lazy_static::lazy_static! {
    static ref ENGLISH: BTreeMap<&'static str, &'static str> = btree! {
        "blankName" => "Key is required.",
        "blankNumber" => "A valid number is required.",
        "blankQuery" => "A valid query object is required.",
        "blankSession" => "A valid, active session is required.",
    };

    static ref TURKISH: BTreeMap<&'static str, &'static str> = btree! {
        "blankName" => "Bir anahtar belirtmelisin.",
        "blankNumber" => "Geçerli bir sayı belirtmelisin.",
        "blankQuery" => "Geçerli bir sorgu nesnesi belirtmelisin.",
        "blankSession" => "Geçerli ve aktif bir oturum belirtmelisin.",
    };
}

#[derive(Deserialize)]
struct BundleFile {
    #[serde(default)]
    errors: HashMap<String, String>,
}

/// A locale bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Messages {
    errors: HashMap<String, String>,
}

impl Messages {
    /// The built-in bundle for a language.
    pub fn for_language(language: Language) -> Self {
        let table: &BTreeMap<&'static str, &'static str> = match language {
            Language::En => &*ENGLISH,
            Language::Tr => &*TURKISH,
        };
        Self {
            errors: table
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Parse a custom bundle of the form `{"errors": {"blankName": "..."}}`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let bundle: BundleFile = serde_json::from_str(text)?;
        Ok(Self {
            errors: bundle.errors,
        })
    }

    /// Look up the text for a key, falling back to English.
    pub fn text(&self, key: MessageKey) -> &str {
        self.errors
            .get(key.as_str())
            .map(String::as_str)
            .unwrap_or_else(|| key.default_text())
    }
}
