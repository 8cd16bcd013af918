//! API Configuration Module
//!
//! Configuration for CORS, the WebSocket channel, and the data files the
//! server loads at startup. Loaded from environment variables with
//! permissive defaults for development.

use std::path::PathBuf;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS and server-side resources.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://escruta.example.org,https://sala.escruta.example.org"
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// WebSocket broadcast channel capacity.
    pub ws_capacity: usize,

    /// Electoral directory file (municipalities, stations, tables).
    pub directory_path: Option<PathBuf>,

    /// Witness assignment file.
    pub assignments_path: Option<PathBuf>,

    /// Bearer-token identity file.
    pub identities_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(), // Empty = allow all
            cors_max_age_secs: 86400, // 24 hours
            ws_capacity: 1000,
            directory_path: None,
            assignments_path: None,
            identities_path: None,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ESCRUTA_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `ESCRUTA_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `ESCRUTA_WS_CAPACITY`: Broadcast channel capacity (default: 1000)
    /// - `ESCRUTA_DIRECTORY_PATH`: Electoral directory JSON file
    /// - `ESCRUTA_ASSIGNMENTS_PATH`: Witness assignment JSON file
    /// - `ESCRUTA_IDENTITIES_PATH`: Bearer-token identity JSON file
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("ESCRUTA_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("ESCRUTA_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        let ws_capacity = std::env::var("ESCRUTA_WS_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let directory_path = std::env::var("ESCRUTA_DIRECTORY_PATH").ok().map(PathBuf::from);
        let assignments_path = std::env::var("ESCRUTA_ASSIGNMENTS_PATH")
            .ok()
            .map(PathBuf::from);
        let identities_path = std::env::var("ESCRUTA_IDENTITIES_PATH")
            .ok()
            .map(PathBuf::from);

        Self {
            cors_origins,
            cors_max_age_secs,
            ws_capacity,
            directory_path,
            assignments_path,
            identities_path,
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            // Dev mode: allow all
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            // Exact match or wildcard subdomain match
            if allowed == origin {
                return true;
            }
            // Support wildcard subdomains: *.escruta.example.org
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(pattern)
                        || origin_domain == pattern.strip_prefix('.').unwrap_or(pattern);
                }
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.cors_max_age_secs, 86400);
        assert_eq!(config.ws_capacity, 1000);
        assert!(config.directory_path.is_none());
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());

        config.cors_origins = vec!["https://escruta.example.org".to_string()];
        assert!(config.is_production());
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(config.is_origin_allowed("http://localhost:3000"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec![
            "https://escruta.example.org".to_string(),
            "https://sala.escruta.example.org".to_string(),
        ];

        assert!(config.is_origin_allowed("https://escruta.example.org"));
        assert!(config.is_origin_allowed("https://sala.escruta.example.org"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        assert!(!config.is_origin_allowed("https://notescruta.example.org"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec!["*.escruta.example.org".to_string()];

        assert!(config.is_origin_allowed("https://sala.escruta.example.org"));
        assert!(config.is_origin_allowed("https://api.escruta.example.org"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }
}
