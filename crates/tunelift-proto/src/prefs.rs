use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Client preferences persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

pub struct PrefsStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PrefsStore {
    /// Read preferences from `path`.  A missing or unreadable file yields
    /// defaults; it is only written on the first change.
    pub fn open(path: PathBuf) -> Self {
        let prefs = Self::load(&path);
        Self { path, prefs }
    }

    pub fn default_path() -> PathBuf {
        platform::data_dir().join("prefs.json")
    }

    fn load(path: &Path) -> Preferences {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt preferences {}: {}", path.display(), e);
                    Preferences::default()
                }
            },
            Err(_) => Preferences::default(),
        }
    }

    pub fn theme(&self) -> Theme {
        self.prefs.theme
    }

    /// Flip the theme and persist it.  Returns the new theme.
    pub fn toggle_theme(&mut self) -> anyhow::Result<Theme> {
        self.prefs.theme = self.prefs.theme.toggled();
        self.save()?;
        Ok(self.prefs.theme)
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.prefs)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
