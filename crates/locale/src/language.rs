use serde::{Deserialize, Serialize};

/// Supported reply languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
    Rw,
    Sw,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
            Self::Rw => "rw",
            Self::Sw => "sw",
        }
    }

    /// All supported languages, for iteration.
    pub const ALL: &'static [Language] = &[Self::En, Self::Fr, Self::Rw, Self::Sw];
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported language code: {0}")]
pub struct UnsupportedLanguage(pub String);

impl std::str::FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept bare codes and region-qualified forms like "fr-RW".
        let code = s.trim().to_lowercase();
        let base = code.split(['-', '_']).next().unwrap_or(&code);
        match base {
            "en" => Ok(Self::En),
            "fr" => Ok(Self::Fr),
            "rw" | "kin" => Ok(Self::Rw),
            "sw" | "swa" => Ok(Self::Sw),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}
