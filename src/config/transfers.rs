//! Admin transfer UI configuration

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct TransfersConfig {
    /// Where accept/reject redirect after a decision
    #[serde(default = "default_pending_view_path")]
    pub pending_view_path: String,
}

impl TransfersConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.pending_view_path.starts_with('/') || self.pending_view_path.starts_with("//") {
            return Err(ValidationError::InvalidPendingViewPath);
        }
        Ok(())
    }
}

impl Default for TransfersConfig {
    fn default() -> Self {
        Self {
            pending_view_path: default_pending_view_path(),
        }
    }
}

fn default_pending_view_path() -> String {
    "/admin/transfers/pending".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_valid() {
        assert!(TransfersConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_relative_and_protocol_relative_paths() {
        for path in ["pending", "//evil.example.com/pending"] {
            let config = TransfersConfig {
                pending_view_path: path.to_string(),
            };
            assert_eq!(
                config.validate(),
                Err(ValidationError::InvalidPendingViewPath)
            );
        }
    }
}
