// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health and service info endpoints.

use axum::Json;
use serde::Serialize;

const SERVICE: &str = "ifc-stream-server";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

/// Service name plus the routes it answers, as `METHOD path`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: [&'static str; 4],
}

/// GET /api/v1/health
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: SERVICE,
    })
}

/// GET /
pub async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: [
            "GET /api/v1/health",
            "POST /api/v1/tilesets",
            "GET /api/v1/tiles/:key",
            "DELETE /api/v1/tiles",
        ],
    })
}
