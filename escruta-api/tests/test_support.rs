//! Shared fixtures for API integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;

use escruta_api::ws::WsState;
use escruta_api::{create_api_router, ApiConfig};
use escruta_core::{
    CallerIdentity, CapabilitySet, EntityIdType, MunicipalityId, ReporterId, StationId,
    WitnessAssignment,
};
use escruta_engine::{StaticDirectory, StaticIdentityProvider, StaticRegistry};
use escruta_storage::{InMemoryReportStore, ReportStore};

pub const WITNESS_TOKEN: &str = "witness-token";
pub const SUPERVISOR_TOKEN: &str = "supervisor-token";
/// A reporter with the submit capability but no table assignment.
pub const ROVING_TOKEN: &str = "roving-token";

pub struct TestApi {
    pub router: Router,
    pub municipality_id: MunicipalityId,
    pub station_id: StationId,
    pub witness_id: ReporterId,
    pub supervisor_id: ReporterId,
}

/// One municipality, one station, three tables. The witness covers tables
/// 1 and 2; table 3 has no witness and enough voters to count as a
/// critical gap.
pub fn test_api() -> TestApi {
    let mut directory = StaticDirectory::new();
    let municipality_id = directory.add_municipality("Sahagún");
    let station_id = directory.add_station(municipality_id, "IE La Inmaculada");
    directory.add_table(station_id, 1, 380);
    directory.add_table(station_id, 2, 420);
    directory.add_table(station_id, 3, 400);

    let witness_id = ReporterId::now_v7();
    let supervisor_id = ReporterId::now_v7();
    let roving_id = ReporterId::now_v7();

    let mut registry = StaticRegistry::new();
    registry.assign(WitnessAssignment::new(
        witness_id,
        "Nubia Cardozo",
        station_id,
        vec![1, 2],
    ));

    let mut identities = StaticIdentityProvider::new();
    identities.register(
        WITNESS_TOKEN,
        CallerIdentity::new(witness_id, "Nubia Cardozo", CapabilitySet::witness()),
    );
    identities.register(
        SUPERVISOR_TOKEN,
        CallerIdentity::new(supervisor_id, "Sofía Mena", CapabilitySet::supervisor()),
    );
    identities.register(
        ROVING_TOKEN,
        CallerIdentity::new(roving_id, "Pedro Lemos", CapabilitySet::witness()),
    );

    let store: Arc<dyn ReportStore> = Arc::new(InMemoryReportStore::new());
    let ws = Arc::new(WsState::new(64));
    let router = create_api_router(
        store,
        Arc::new(directory),
        Arc::new(registry),
        Arc::new(identities),
        ws,
        &ApiConfig::default(),
    )
    .expect("router must assemble");

    TestApi {
        router,
        municipality_id,
        station_id,
        witness_id,
        supervisor_id,
    }
}

impl TestApi {
    /// A submission request for one of the fixture's tables.
    pub fn submit_request(
        &self,
        token: &str,
        table_number: i32,
        (registered, candidate, blank, null): (i32, i32, i32, i32),
    ) -> Request<Body> {
        let body = serde_json::json!({
            "station_id": self.station_id,
            "table_number": table_number,
            "votes_registered": registered,
            "votes_candidate": candidate,
            "votes_blank": blank,
            "votes_null": null,
        });
        json_request("POST", "/api/v1/reports", token, &body)
    }
}

pub fn authed_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: &str,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body must be readable");
    serde_json::from_slice(&bytes).expect("response body must be JSON")
}
