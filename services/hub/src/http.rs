//! Read-only operational endpoints.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MapStats {
    #[serde(rename = "mapID")]
    pub map_id: String,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub maps: Vec<MapStats>,
}

/// `GET /api/v1/stats` — hub occupancy snapshot.
pub async fn get_stats(State(state): State<AppState>) -> Json<HubStats> {
    let mut maps = Vec::new();
    for map_id in state.hub.maps().await {
        let sessions = state.hub.count_in_map(&map_id).await;
        maps.push(MapStats { map_id, sessions });
    }
    maps.sort_by(|a, b| a.map_id.cmp(&b.map_id));
    Json(HubStats {
        connections: state.hub.count().await,
        maps,
    })
}
