//! Persona
//!
//! Who the assistant speaks for. Built-in default, optionally replaced by a
//! TOML file (`WHATSBOT_PERSONA`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Owner identity and public profile
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Persona {
    /// Owner's full name
    pub name: String,
    /// Professional role / headline
    pub role: String,
    pub tagline: String,
    pub site: String,
    pub email: String,
    pub github: String,
    pub location: String,
    pub services: Vec<String>,
    pub technologies: Vec<String>,
    /// Prefix every outbound reply starts with
    pub tag: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Alex Rivera".to_string(),
            role: "Full Stack Developer & Data Analyst".to_string(),
            tagline: "Turning data into smart decisions".to_string(),
            site: "https://alexrivera.dev".to_string(),
            email: "hello@alexrivera.dev".to_string(),
            github: "github.com/alexrivera".to_string(),
            location: "Remote".to_string(),
            services: vec![
                "Campaign analytics with Python".to_string(),
                "Process and systems automation".to_string(),
                "Data-driven solutions".to_string(),
                "Full stack development".to_string(),
            ],
            technologies: vec![
                "Python".to_string(),
                "JavaScript".to_string(),
                "SQL".to_string(),
                "Pandas".to_string(),
                "Git".to_string(),
                "Linux".to_string(),
            ],
            tag: "[Assistant]".to_string(),
        }
    }
}

impl Persona {
    /// Load from a TOML file; missing fields fall back to the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read persona file {}", path.display()))?;
        let persona: Persona = toml::from_str(&raw)
            .with_context(|| format!("Invalid persona file {}", path.display()))?;

        info!("Persona loaded: {} ({})", persona.name, path.display());
        Ok(persona)
    }

    /// First `n` services joined for one-line summaries
    pub fn services_summary(&self, n: usize) -> String {
        self.services
            .iter()
            .take(n)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}
