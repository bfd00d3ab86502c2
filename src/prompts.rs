//! Prompt texts and canned replies.
//!
//! The bundled texts live in `prompts/` and are compiled in. A directory
//! configured under `prompts.dir` can override any of them file by file, so
//! intent detection can be tuned without a rebuild.

use std::fs;
use std::path::Path;

use crate::error::{AssistantError, Result};

/// Bump whenever a bundled prompt changes meaning.
pub const PROMPT_VERSION: &str = "2";

const INTENT_SYSTEM_FILE: &str = "intent_system.txt";
const SYNTH_SYSTEM_FILE: &str = "synth_system.txt";
const NON_WEATHER_FILE: &str = "non_weather_reply.txt";
const NEEDS_LOCATION_FILE: &str = "needs_location_reply.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub version: String,
    pub intent_system: String,
    pub synth_system: String,
    pub non_weather_reply: String,
    pub needs_location_reply: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            version: PROMPT_VERSION.to_string(),
            intent_system: include_str!("../prompts/intent_system.txt").trim().to_string(),
            synth_system: include_str!("../prompts/synth_system.txt").trim().to_string(),
            non_weather_reply: include_str!("../prompts/non_weather_reply.txt")
                .trim()
                .to_string(),
            needs_location_reply: include_str!("../prompts/needs_location_reply.txt")
                .trim()
                .to_string(),
        }
    }
}

impl Prompts {
    /// Bundled prompts, with any file present in `dir` taking precedence.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut prompts = Self::default();
        let Some(dir) = dir else {
            return Ok(prompts);
        };

        if !dir.is_dir() {
            return Err(AssistantError::Config(format!(
                "Prompt directory {} does not exist",
                dir.display()
            )));
        }

        let mut overridden = Vec::new();
        for (file, slot) in [
            (INTENT_SYSTEM_FILE, &mut prompts.intent_system),
            (SYNTH_SYSTEM_FILE, &mut prompts.synth_system),
            (NON_WEATHER_FILE, &mut prompts.non_weather_reply),
            (NEEDS_LOCATION_FILE, &mut prompts.needs_location_reply),
        ] {
            let path = dir.join(file);
            if !path.exists() {
                continue;
            }
            let text = fs::read_to_string(&path).map_err(|e| {
                AssistantError::Config(format!("Failed to read prompt {}: {e}", path.display()))
            })?;
            let text = text.trim();
            if text.is_empty() {
                return Err(AssistantError::Config(format!(
                    "Prompt file {} is empty",
                    path.display()
                )));
            }
            *slot = text.to_string();
            overridden.push(file);
        }

        if !overridden.is_empty() {
            prompts.version = format!("{PROMPT_VERSION}+{}", dir.display());
            tracing::info!(dir = %dir.display(), files = ?overridden, "Loaded prompt overrides");
        }

        Ok(prompts)
    }
}
