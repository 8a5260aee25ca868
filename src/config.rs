//! Runtime configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional `certmail.toml` next to the binary, and `CERTMAIL_*`
//! environment variables (with `__` separating sections, e.g.
//! `CERTMAIL_EMAIL__API_KEY`). Secrets are only accepted from the
//! environment in practice, which is why the API key is validated to be
//! present before anything talks to the network.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// SQLite database file.
    pub database_path: PathBuf,
    pub sheets: SheetSettings,
    pub assets: AssetSettings,
    pub email: EmailSettings,
}

/// Tabular source settings.
#[derive(Debug, Deserialize)]
pub struct SheetSettings {
    /// Default workbook directory when the command line does not name one.
    pub workbook_dir: Option<PathBuf>,
}

/// File assets used by the certificate renderer.
#[derive(Debug, Deserialize)]
pub struct AssetSettings {
    pub template: PathBuf,
    pub name_font: PathBuf,
    pub text_font: PathBuf,
}

#[derive(Deserialize)]
pub struct EmailSettings {
    /// Mail API endpoint, overridable for tests.
    pub base_url: String,
    /// Sending domain registered with the mail provider.
    pub domain: String,
    pub api_key: Secret<String>,
    /// From header, e.g. `Certificates <certs@mg.example.com>`.
    pub sender: String,
    /// Comma-separated addresses blind-copied on every certificate mail.
    pub bcc: String,
    pub timeout_secs: u64,
    /// Pause between consecutive sends, to stay under provider rate limits.
    pub send_delay_ms: u64,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("base_url", &self.base_url)
            .field("domain", &self.domain)
            .field("api_key", &"<redacted>")
            .field("sender", &self.sender)
            .field("bcc", &self.bcc)
            .field("timeout_secs", &self.timeout_secs)
            .field("send_delay_ms", &self.send_delay_ms)
            .finish()
    }
}

impl EmailSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    /// The bcc setting split into individual addresses.
    #[must_use]
    pub fn bcc_list(&self) -> Vec<String> {
        self.bcc
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

impl Settings {
    /// Load settings from defaults, `certmail.toml`, and the environment.
    pub fn load() -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("database_path", "certmail.db")?
            .set_default("sheets.workbook_dir", None::<String>)?
            .set_default("assets.template", "assets/template.png")?
            .set_default("assets.name_font", "assets/name_font.ttf")?
            .set_default("assets.text_font", "assets/text_font.ttf")?
            .set_default("email.base_url", "https://api.mailgun.net")?
            .set_default("email.domain", "")?
            .set_default("email.api_key", "")?
            .set_default("email.sender", "")?
            .set_default("email.bcc", "")?
            .set_default("email.timeout_secs", 10)?
            .set_default("email.send_delay_ms", 1000)?
            .add_source(File::with_name("certmail").required(false))
            .add_source(
                Environment::with_prefix("CERTMAIL").prefix_separator("_").separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Check that everything the send path needs is present.
    ///
    /// Import and inflection commands work without mail credentials, so
    /// this runs only when a command is about to send.
    pub fn validate_for_sending(&self) -> Result<()> {
        if self.email.api_key.expose_secret().is_empty() {
            return Err(Error::MissingEnv("CERTMAIL_EMAIL__API_KEY"));
        }
        if self.email.domain.is_empty() {
            return Err(Error::MissingEnv("CERTMAIL_EMAIL__DOMAIN"));
        }
        if self.email.sender.is_empty() {
            return Err(Error::MissingEnv("CERTMAIL_EMAIL__SENDER"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str, domain: &str, sender: &str) -> Settings {
        Settings {
            database_path: PathBuf::from("certmail.db"),
            sheets: SheetSettings { workbook_dir: None },
            assets: AssetSettings {
                template: PathBuf::from("assets/template.png"),
                name_font: PathBuf::from("assets/name_font.ttf"),
                text_font: PathBuf::from("assets/text_font.ttf"),
            },
            email: EmailSettings {
                base_url: "https://api.mailgun.net".to_string(),
                domain: domain.to_string(),
                api_key: Secret::new(api_key.to_string()),
                sender: sender.to_string(),
                bcc: String::new(),
                timeout_secs: 10,
                send_delay_ms: 1000,
            },
        }
    }

    #[test]
    fn complete_settings_validate() {
        assert!(settings("key", "mg.example.com", "certs@mg.example.com")
            .validate_for_sending()
            .is_ok());
    }

    #[test]
    fn missing_api_key_names_the_variable() {
        let err = settings("", "mg.example.com", "s").validate_for_sending().unwrap_err();
        assert!(matches!(err, Error::MissingEnv("CERTMAIL_EMAIL__API_KEY")));
    }

    #[test]
    fn missing_domain_names_the_variable() {
        let err = settings("key", "", "s").validate_for_sending().unwrap_err();
        assert!(matches!(err, Error::MissingEnv("CERTMAIL_EMAIL__DOMAIN")));
    }

    #[test]
    fn bcc_list_splits_and_trims() {
        let mut config = settings("key", "d", "s");
        config.email.bcc = "a@b.ru, c@d.ru,,  e@f.ru ".to_string();
        assert_eq!(config.email.bcc_list(), vec!["a@b.ru", "c@d.ru", "e@f.ru"]);
        config.email.bcc = String::new();
        assert!(config.email.bcc_list().is_empty());
    }

    #[test]
    fn debug_redacts_the_api_key() {
        let rendered = format!("{:?}", settings("super-secret", "d", "s").email);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
