//! OpenAPI Specification for the ESCRUTA API
//!
//! This module defines the OpenAPI document for the ESCRUTA REST API.
//! It uses utoipa to generate the OpenAPI specification from Rust types
//! and route annotations.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::types::{
    AggregateResponse, ListReportsResponse, SetValidationRequest, SubmitReportRequest,
};

// Import route modules for path references
use crate::routes::{aggregate, coverage, health, report, station};

// Import domain types from escruta-core
use escruta_core::{
    AggregateScope, CoverageReport, IrregularityType, OverloadedReporter, StationCoverage,
    TableCoverage, TableReport, VoteTally,
};

/// OpenAPI document for the ESCRUTA API.
///
/// This struct generates the complete OpenAPI specification for the API,
/// including all schemas, paths, and security definitions.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ESCRUTA API",
        version = "0.3.0",
        description = "Electoral results synchronization and aggregation engine - collects table tallies from field reporters, validates them, and rolls them up to station, municipality, and national totals",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "https://api.escruta.example.org", description = "Production"),
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Reports", description = "Table report submission and supervisor validation"),
        (name = "Stations", description = "Per-station report listings"),
        (name = "Aggregates", description = "Vote rollups at table, station, municipality, and global scope"),
        (name = "Coverage", description = "Witness coverage gaps and reporter load"),
        (name = "Health", description = "Service liveness")
    ),
    paths(
        // === Report Routes ===
        report::submit_report,
        report::get_report,
        report::set_validation,

        // === Station Routes ===
        station::list_station_reports,

        // === Aggregate Routes ===
        aggregate::get_aggregates,

        // === Coverage Routes ===
        coverage::get_coverage,

        // === Health Routes ===
        health::health,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Request/Response Types ===
            SubmitReportRequest, SetValidationRequest, ListReportsResponse,
            AggregateResponse,
            health::HealthResponse, health::HealthStatus,

            // === Core Domain Types (from escruta-core) ===
            TableReport, VoteTally, IrregularityType, AggregateScope,
            CoverageReport, TableCoverage, StationCoverage, OverloadedReporter,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            // Bearer token authentication
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Reporter bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();

        // Verify basic structure
        assert_eq!(openapi.info.title, "ESCRUTA API");
        assert_eq!(openapi.info.version, "0.3.0");

        // Verify servers
        let servers = openapi
            .servers
            .as_ref()
            .ok_or_else(|| "OpenAPI servers missing".to_string())?;
        assert_eq!(servers.len(), 2);

        // Verify tags exist
        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert!(tags.len() >= 5);

        // Verify security schemes
        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("bearer_auth"));
        Ok(())
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;

        // Verify it's valid JSON by parsing it back
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;

        // Verify key fields are present (allow for spacing variations)
        assert!(json.contains("ESCRUTA API"));
        assert!(json.contains("\"bearer_auth\""));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();

        // Verify paths are populated
        assert!(!openapi.paths.paths.is_empty());

        // Verify key paths exist
        assert!(openapi.paths.paths.contains_key("/api/v1/reports"));
        assert!(openapi.paths.paths.contains_key("/api/v1/reports/{id}"));
        assert!(openapi
            .paths
            .paths
            .contains_key("/api/v1/reports/{id}/validation"));
        assert!(openapi
            .paths
            .paths
            .contains_key("/api/v1/stations/{station_id}/reports"));
        assert!(openapi.paths.paths.contains_key("/api/v1/aggregates"));
        assert!(openapi.paths.paths.contains_key("/api/v1/coverage"));
        assert!(openapi.paths.paths.contains_key("/health"));
    }
}
