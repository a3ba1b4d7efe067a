//! Output formatting for CLI

use serde::Serialize;

use dzr_core::{ResolutionPath, ResolvedMedia};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Print `data` as JSON, or through `text` otherwise
pub fn print<T: Serialize>(data: &T, format: &str, text: impl FnOnce(&T) -> String) {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string()));
        }
        OutputFormat::Text => println!("{}", text(data)),
    }
}

#[derive(Serialize)]
pub struct KeyView {
    pub track_id: String,
    pub key: String,
}

/// Displayable summary of a resolution
#[derive(Serialize)]
pub struct ResolvedView {
    pub track_id: String,
    pub url: String,
    pub format: Option<String>,
    pub path: ResolutionPath,
    pub key: String,
}

impl From<&ResolvedMedia> for ResolvedView {
    fn from(media: &ResolvedMedia) -> Self {
        Self {
            track_id: media.track_id.clone(),
            url: media.url.to_string(),
            format: media.format.map(|f| f.to_string()),
            path: media.path.clone(),
            key: hex::encode(media.cipher.key()),
        }
    }
}

impl ResolvedView {
    pub fn to_text(&self) -> String {
        format!(
            "Track:  {}\nURL:    {}\nFormat: {}\nPath:   {}\nKey:    {}",
            self.track_id,
            self.url,
            self.format.as_deref().unwrap_or("unknown"),
            self.path,
            self.key
        )
    }
}
