//! ---
//! dcp_section: "08-energy-models-optimization"
//! dcp_subsection: "module"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Power string balancing and failure-impact routines."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use dcpower_common::config::PlantConfig;

use crate::model::Consumer;

#[cfg(feature = "rest-api")]
pub use rest::router;

#[cfg(feature = "rest-api")]
mod rest {
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::Arc;
    use tracing::warn;

    use crate::{
        analyze_consumers, analyze_plant, errors::EngineError, model::StringId,
        redundancy::parse_redundancy, PlantStudy, StringStudy,
    };

    use super::{AnalyzeRequest, PlanRequest};

    #[derive(Clone, Default)]
    pub struct PowerStringState;

    pub fn router() -> Router {
        Router::new()
            .route("/api/strings/analyze", post(analyze))
            .route("/api/strings/plan", post(plan))
            .with_state(Arc::new(PowerStringState))
    }

    pub(super) async fn analyze(
        State(_): State<Arc<PowerStringState>>,
        Json(payload): Json<AnalyzeRequest>,
    ) -> Result<Json<StringStudy>, StatusCode> {
        let redundancy = parse_redundancy(&payload.redundancy).map_err(map_err)?;
        analyze_consumers(
            &payload.consumers,
            redundancy,
            payload.failed_string.map(StringId),
        )
        .map(Json)
        .map_err(map_err)
    }

    pub(super) async fn plan(
        State(_): State<Arc<PowerStringState>>,
        Json(payload): Json<PlanRequest>,
    ) -> Result<Json<PlantStudy>, StatusCode> {
        if let Err(err) = payload.plant.validate() {
            warn!(error = %err, "rejected plant request");
            return Err(StatusCode::BAD_REQUEST);
        }
        analyze_plant(&payload.plant).map(Json).map_err(map_err)
    }

    fn map_err(err: EngineError) -> StatusCode {
        if err.is_configuration() {
            warn!(error = %err, "rejected power string request");
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalyzeRequest {
    pub redundancy: String,
    pub consumers: Vec<Consumer>,
    #[serde(default)]
    pub failed_string: Option<usize>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub plant: PlantConfig,
}
