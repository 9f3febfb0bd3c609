//! JSON-Frames zwischen Client und Sitzung
//!
//! Eingehend: `{"message": "<text>"}`
//! Ausgehend: `{"message": "<text>", "username": "<autor>"}` oder
//! `{"error": "<beschreibung>"}`

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};

/// Frame vom Client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EingehenderFrame {
    pub message: String,
}

impl EingehenderFrame {
    /// Parst einen rohen Text-Frame
    pub fn parsen(raw: &str) -> ChatResult<Self> {
        serde_json::from_str(raw).map_err(|e| ChatError::UngueltigerFrame(e.to_string()))
    }
}

/// Frame an den Client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AusgehenderFrame {
    Nachricht { message: String, username: String },
    Fehler { error: String },
}

impl AusgehenderFrame {
    pub fn fehler(beschreibung: impl Into<String>) -> Self {
        Self::Fehler {
            error: beschreibung.into(),
        }
    }

    /// Serialisiert den Frame als JSON-Text
    pub fn als_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Darstellung des Nachrichtentexts in ausgehenden Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AusgabeFormat {
    /// Klartext wie gesendet
    #[default]
    Text,
    /// HTML-Fragment fuer htmx out-of-band swaps
    Html,
}

impl AusgabeFormat {
    /// Rendert den Nachrichtentext fuer einen Empfaenger
    pub fn rendern(self, username: &str, text: &str) -> String {
        match self {
            Self::Text => text.to_string(),
            Self::Html => format!(
                "<div hx-swap-oob='beforeend:#messages'><p><b>{}</b>: {}</p></div>",
                html_escape(username),
                html_escape(text)
            ),
        }
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
