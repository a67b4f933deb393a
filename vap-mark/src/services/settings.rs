//! Runtime settings stored in the database

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::services::recognition::validate_threshold;
use crate::store::{Repository, SettingsStore};

pub const RECOGNITION_THRESHOLD_KEY: &str = "recognition_threshold";

pub struct SettingsService {
    repo: Arc<dyn Repository>,
    default_threshold: f64,
}

impl SettingsService {
    /// `default_threshold` applies when the settings table has no value
    pub fn new(repo: Arc<dyn Repository>, default_threshold: f64) -> Self {
        Self {
            repo,
            default_threshold,
        }
    }

    /// Threshold for a mark request: explicit value, else stored setting, else default
    pub async fn resolve_threshold(&self, requested: Option<f64>) -> Result<f64> {
        if let Some(threshold) = requested {
            return validate_threshold(threshold);
        }

        match self.repo.get_setting(RECOGNITION_THRESHOLD_KEY).await? {
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if (0.0..=1.0).contains(&value) => Ok(value),
                _ => {
                    warn!(value = %raw, "Ignoring invalid stored recognition_threshold");
                    Ok(self.default_threshold)
                }
            },
            None => Ok(self.default_threshold),
        }
    }

    pub async fn set_threshold(&self, threshold: f64) -> Result<f64> {
        let threshold = validate_threshold(threshold)?;
        self.repo
            .set_setting(RECOGNITION_THRESHOLD_KEY, &threshold.to_string())
            .await?;
        info!(threshold, "Recognition threshold updated");
        Ok(threshold)
    }

    /// Stored settings plus the effective threshold
    pub async fn list(&self) -> Result<BTreeMap<String, String>> {
        let mut settings: BTreeMap<String, String> =
            self.repo.list_settings().await?.into_iter().collect();
        settings
            .entry(RECOGNITION_THRESHOLD_KEY.to_string())
            .or_insert_with(|| self.default_threshold.to_string());
        Ok(settings)
    }

    /// Only known keys are writable
    pub async fn set(&self, key: &str, value: &serde_json::Value) -> Result<String> {
        match key {
            RECOGNITION_THRESHOLD_KEY => {
                let threshold = value
                    .as_f64()
                    .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                    .ok_or_else(|| {
                        let message = format!("{} must be a number", RECOGNITION_THRESHOLD_KEY);
                        Error::InvalidInput(message)
                    })?;
                Ok(self.set_threshold(threshold).await?.to_string())
            }
            other => Err(Error::InvalidInput(format!("Unknown setting: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRepository, SettingsStore};
    use serde_json::json;

    #[tokio::test]
    async fn test_threshold_resolution_order() {
        let repo = Arc::new(MemoryRepository::new());
        let settings = SettingsService::new(repo.clone(), 0.6);

        assert_eq!(settings.resolve_threshold(None).await.unwrap(), 0.6);

        settings.set_threshold(0.75).await.unwrap();
        assert_eq!(settings.resolve_threshold(None).await.unwrap(), 0.75);
        assert_eq!(settings.resolve_threshold(Some(0.4)).await.unwrap(), 0.4);

        repo.set_setting(RECOGNITION_THRESHOLD_KEY, "garbage").await.unwrap();
        assert_eq!(settings.resolve_threshold(None).await.unwrap(), 0.6);
    }

    #[tokio::test]
    async fn test_rejects_out_of_range() {
        let settings = SettingsService::new(Arc::new(MemoryRepository::new()), 0.6);
        assert!(matches!(
            settings.resolve_threshold(Some(-0.1)).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            settings.set(RECOGNITION_THRESHOLD_KEY, &json!(2)).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(settings.set("theme", &json!("dark")).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_set_accepts_string_numbers() {
        let settings = SettingsService::new(Arc::new(MemoryRepository::new()), 0.6);
        assert_eq!(settings.set(RECOGNITION_THRESHOLD_KEY, &json!("0.7")).await.unwrap(), "0.7");
        assert_eq!(settings.list().await.unwrap()[RECOGNITION_THRESHOLD_KEY], "0.7");
    }
}
