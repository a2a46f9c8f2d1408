//! HTTP handler functions for the septic locator API.

use actix_web::{HttpRequest, HttpResponse, web};
use septic_locator_database::lookup_log::LookupLogEntry;
use septic_locator_lookup::StoreError;
use septic_locator_lookup_models::ClassificationResult;
use septic_locator_septic_models::LatLng;
use septic_locator_server_models::{
    ApiCoverage, ApiError, ApiHealth, ApiReload, ApiSource, CoverageQueryParams,
    LookupQueryParams, LookupRequest,
};

use crate::AppState;

/// Largest search radius a caller may request.
pub const MAX_RADIUS_METERS: f64 = 5_000.0;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/lookup`
pub async fn lookup_get(
    state: web::Data<AppState>,
    params: web::Query<LookupQueryParams>,
) -> HttpResponse {
    run_lookup(&state, params.into_inner().into()).await
}

/// `POST /api/lookup`
pub async fn lookup_post(
    state: web::Data<AppState>,
    body: web::Json<LookupRequest>,
) -> HttpResponse {
    run_lookup(&state, body.into_inner()).await
}

async fn run_lookup(state: &web::Data<AppState>, request: LookupRequest) -> HttpResponse {
    let point = match LatLng::try_new(request.lat, request.lng) {
        Ok(point) => point,
        Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };
    if let Some(radius) = request.radius_meters
        && !(radius.is_finite() && radius > 0.0 && radius <= MAX_RADIUS_METERS)
    {
        return HttpResponse::BadRequest().json(ApiError::new(format!(
            "radius must be between 0 and {MAX_RADIUS_METERS} meters"
        )));
    }

    let result = state.lookup.lookup(point, request.radius_meters).await;
    let radius = request
        .radius_meters
        .unwrap_or(state.lookup.config().default_radius_meters);
    record_lookup(state, request.address, point, radius, &result);

    HttpResponse::Ok().json(result)
}

/// Writes the lookup log entry on a blocking thread without waiting for it.
fn record_lookup(
    state: &web::Data<AppState>,
    address: Option<String>,
    point: LatLng,
    radius_meters: f64,
    result: &ClassificationResult,
) {
    let Some(lookup_log) = state.lookup_log.clone() else {
        return;
    };

    let entry = LookupLogEntry {
        id: uuid::Uuid::new_v4().to_string(),
        address,
        lat: point.lat,
        lng: point.lng,
        classification: result.classification.to_string(),
        confidence: result.confidence.to_string(),
        result_summary: serde_json::json!({
            "isCovered": result.is_covered,
            "radiusMeters": radius_meters,
            "featureCount": result.nearest_features.len(),
            "nearestDistanceMeters": result.nearest_features.first().map(|n| n.distance_meters),
            "sources": result.coverage_sources.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "dataQuality": result.data_quality,
            "riskLevel": result.risk_level,
        }),
    };

    actix_web::rt::spawn(async move {
        let written = web::block(move || lookup_log.record(&entry)).await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to record lookup: {e}"),
            Err(e) => log::warn!("Lookup log task failed: {e}"),
        }
    });
}

/// `GET /api/coverage`
pub async fn coverage(
    state: web::Data<AppState>,
    params: web::Query<CoverageQueryParams>,
) -> HttpResponse {
    let point = match LatLng::try_new(params.lat, params.lng) {
        Ok(point) => point,
        Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };

    let result = state.lookup.lookup(point, None).await;

    HttpResponse::Ok().json(ApiCoverage {
        is_covered: result.is_covered,
        sources: result
            .coverage_sources
            .into_iter()
            .map(ApiSource::from)
            .collect(),
        classification: result.classification,
        confidence: result.confidence,
    })
}

/// `GET /api/sources`
pub async fn sources(state: web::Data<AppState>) -> HttpResponse {
    match state.lookup.sources().await {
        Ok(sources) => {
            let sources: Vec<ApiSource> = sources.into_iter().map(ApiSource::from).collect();
            HttpResponse::Ok().json(sources)
        }
        Err(e) => store_error_response("Failed to list sources", &e),
    }
}

/// `POST /api/admin/reload`
///
/// Rebuilds the in-memory indexes from the feature store.
pub async fn admin_reload(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if !state.authorizer.is_admin(&req) {
        return HttpResponse::Unauthorized().json(ApiError::new("admin capability required"));
    }

    let store = state.store.clone();
    match web::block(move || store.reload()).await {
        Ok(Ok(stats)) => HttpResponse::Ok().json(ApiReload {
            feature_count: stats.features,
            source_count: stats.sources,
        }),
        Ok(Err(e)) => store_error_response("Failed to reload feature store", &e),
        Err(e) => {
            log::error!("Reload task failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("reload failed"))
        }
    }
}

fn store_error_response(context: &str, error: &StoreError) -> HttpResponse {
    log::error!("{context}: {error}");
    if error.is_missing_schema() {
        HttpResponse::ServiceUnavailable().json(ApiError::new(
            "feature store is not initialized; deployment incomplete",
        ))
    } else {
        HttpResponse::InternalServerError().json(ApiError::new(context))
    }
}
