use poise::serenity_prelude::ChannelId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

const CONFIG_FILE: &str = "config.json";
const TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";
const TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub discord_token: String,
    // Channel that holds the pinned "강좌 신청하기" message
    pub entry_channel_id: ChannelId,
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    #[serde(default)]
    pub course: CourseSettings,
}

/// Rules of the course form; every key is optional in `config.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CourseSettings {
    // Categories named "<label> <suffix>" are offered as course categories
    pub category_suffix: String,
    // Label used when the requested category does not exist
    pub fallback_category: String,
    pub consent_phrase: String,
    pub modal_timeout_secs: u64,
    // How long a retry button keeps the rejected values
    pub retry_timeout_secs: u64,
}

impl Default for CourseSettings {
    fn default() -> Self {
        Self {
            category_suffix: "강좌".to_string(),
            fallback_category: "기타".to_string(),
            consent_phrase: "동의합니다".to_string(),
            modal_timeout_secs: 3600,
            retry_timeout_secs: 3600,
        }
    }
}

fn default_prefix() -> String {
    "__".to_string()
}

impl Config {
    /// Loads the configuration from `config.json`. If the file doesn't exist,
    /// it creates a default one and prompts the user to fill it.
    ///
    /// `DISCORD_BOT_TOKEN` takes precedence over the token in the file.
    pub async fn load() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let path = Path::new(CONFIG_FILE);

        if !path.exists() {
            let default_config = Config {
                discord_token: TOKEN_PLACEHOLDER.to_string(),
                entry_channel_id: ChannelId::new(1),
                command_prefix: default_prefix(),
                course: CourseSettings::default(),
            };
            default_config.save().await?;

            eprintln!(
                "Created default {}. Please fill in your bot token and entry channel.",
                CONFIG_FILE
            );
            return Err("Configuration file created. Please update it and restart.".into());
        }

        let content = fs::read_to_string(path).await?;
        let mut config: Config = serde_json::from_str(&content)?;

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            config.discord_token = token;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.discord_token.trim().is_empty() || self.discord_token == TOKEN_PLACEHOLDER {
            return Err(format!(
                "Please replace {} in {} with your actual bot token, or set {}.",
                TOKEN_PLACEHOLDER, CONFIG_FILE, TOKEN_ENV
            )
            .into());
        }
        if self.course.category_suffix.is_empty() {
            return Err("course.category_suffix must not be empty.".into());
        }
        Ok(())
    }

    /// Saves the current configuration state to `config.json`.
    pub async fn save(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(CONFIG_FILE, content).await?;
        Ok(())
    }
}
