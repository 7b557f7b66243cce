//! Bridge from the cross-process pub/sub channel into the fan-out plane.
//!
//! HTTP handlers publish POI mutations (create/update/delete, join/leave)
//! as raw JSON; the bridge translates each into a map-scoped envelope.
//! This is the canonical path for POI membership: its payloads carry the
//! participant count and full participant list and supersede the router's
//! optimistic broadcasts.  Redelivery is harmless — the payload fully
//! describes the state, so applying it twice converges to the same thing.

use crate::hub::Hub;
use plaza_protocol::{BridgeEvent, PoiEvent, PoiMembership, ServerMessage};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Subscribe the bridge to the event channel.  The receiver must be created
/// before any event of interest is published; `AppState::new` does so.
pub fn spawn(hub: Arc<Hub>, events_rx: broadcast::Receiver<String>) -> JoinHandle<()> {
    tokio::spawn(run(hub, events_rx))
}

async fn run(hub: Arc<Hub>, mut events_rx: broadcast::Receiver<String>) {
    loop {
        match events_rx.recv().await {
            Ok(payload) => {
                let event = match serde_json::from_str::<BridgeEvent>(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "dropping malformed bridge event");
                        continue;
                    }
                };
                let map_id = event.map_id().to_owned();
                let message = translate(event);
                debug!(map_id = %map_id, kind = message.kind(), "bridging event");
                hub.broadcast_to_map(&map_id, message);
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // Clients reconcile via the next authoritative event.
                warn!(missed, "event subscription lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("event channel closed, bridge exiting");
                break;
            }
        }
    }
}

fn translate(event: BridgeEvent) -> ServerMessage {
    match event {
        BridgeEvent::PoiCreated(poi) => ServerMessage::PoiCreated(poi),
        BridgeEvent::PoiUpdated(poi) => ServerMessage::PoiUpdated(poi),
        BridgeEvent::PoiDeleted(deleted) => ServerMessage::PoiDeleted(deleted),
        BridgeEvent::PoiJoined(membership) => {
            ServerMessage::PoiJoined(canonical_event(membership))
        }
        BridgeEvent::PoiLeft(membership) => ServerMessage::PoiLeft(canonical_event(membership)),
    }
}

/// The canonical membership payload: a field-superset of the router's
/// optimistic one, minus the session id (the mutation came through HTTP).
fn canonical_event(membership: PoiMembership) -> PoiEvent {
    PoiEvent {
        poi_id: membership.poi_id,
        user_id: membership.user_id,
        session_id: None,
        map_id: Some(membership.map_id),
        current_count: Some(membership.current_count),
        participants: Some(membership.participants),
    }
}
