use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Which advice service, if any, enriches recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdviceProviderKind {
    #[default]
    Disabled,
    OpenAi,
    Ollama,
}

impl AdviceProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "none",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    #[must_use]
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::Disabled => None,
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Ollama => Some("http://localhost:11434"),
        }
    }

    #[must_use]
    pub fn default_model(self) -> Option<&'static str> {
        match self {
            Self::Disabled => None,
            Self::OpenAi => Some("gpt-4o-mini"),
            Self::Ollama => Some("qwen2.5:1.5b-instruct-q4_K_M"),
        }
    }
}

impl fmt::Display for AdviceProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdviceProviderKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" | "disabled" => Ok(Self::Disabled),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(SettingsError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("unknown advice provider: {0}")]
    UnknownProvider(String),

    #[error("advice timeout must be at least one second")]
    ZeroTimeout,
}

/// Validated configuration for the advice service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdviceSettings {
    provider: AdviceProviderKind,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct AdviceSettingsDraft {
    pub provider: AdviceProviderKind,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl AdviceSettings {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

    /// Settings with no advice service.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            provider: AdviceProviderKind::Disabled,
            api_key: None,
            model: String::new(),
            base_url: String::new(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn provider(&self) -> AdviceProviderKind {
        self.provider
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.provider != AdviceProviderKind::Disabled
    }
}

impl AdviceSettingsDraft {
    /// Normalize blanks and validate the draft.
    ///
    /// An OpenAI provider without a credential is downgraded to `Disabled`,
    /// since advice is optional.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the base URL is invalid or the timeout is zero.
    pub fn validate(self) -> Result<AdviceSettings, SettingsError> {
        let api_key = normalize_optional(self.api_key);
        let model = normalize_optional(self.model);
        let base_url = normalize_optional(self.base_url);

        if self.timeout_secs == Some(0) {
            return Err(SettingsError::ZeroTimeout);
        }
        let timeout_secs = self
            .timeout_secs
            .unwrap_or(AdviceSettings::DEFAULT_TIMEOUT_SECS);

        let mut provider = self.provider;
        if provider == AdviceProviderKind::OpenAi && api_key.is_none() {
            provider = AdviceProviderKind::Disabled;
        }
        if provider == AdviceProviderKind::Disabled {
            return Ok(AdviceSettings {
                timeout_secs,
                ..AdviceSettings::disabled()
            });
        }

        let base_url = base_url
            .or_else(|| provider.default_base_url().map(str::to_string))
            .unwrap_or_default();
        if Url::parse(&base_url).is_err() {
            return Err(SettingsError::InvalidBaseUrl(base_url));
        }
        let model = model
            .or_else(|| provider.default_model().map(str::to_string))
            .unwrap_or_default();

        Ok(AdviceSettings {
            provider,
            api_key,
            model,
            base_url,
            timeout_secs,
        })
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_without_key_is_disabled() {
        let settings = AdviceSettingsDraft {
            provider: AdviceProviderKind::OpenAi,
            api_key: Some("   ".into()),
            ..AdviceSettingsDraft::default()
        }
        .validate()
        .unwrap();
        assert!(!settings.is_enabled());
    }

    #[test]
    fn ollama_gets_defaults() {
        let settings = AdviceSettingsDraft {
            provider: AdviceProviderKind::Ollama,
            ..AdviceSettingsDraft::default()
        }
        .validate()
        .unwrap();
        assert_eq!(settings.base_url(), "http://localhost:11434");
        assert!(!settings.model().is_empty());
        assert_eq!(settings.timeout_secs(), AdviceSettings::DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = AdviceSettingsDraft {
            provider: AdviceProviderKind::OpenAi,
            api_key: Some("sk-test".into()),
            base_url: Some("not a url".into()),
            ..AdviceSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidBaseUrl(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = AdviceSettingsDraft {
            timeout_secs: Some(0),
            ..AdviceSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SettingsError::ZeroTimeout);
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("OpenAI".parse::<AdviceProviderKind>().unwrap(), AdviceProviderKind::OpenAi);
        assert_eq!("".parse::<AdviceProviderKind>().unwrap(), AdviceProviderKind::Disabled);
        assert!("bard".parse::<AdviceProviderKind>().is_err());
    }
}
