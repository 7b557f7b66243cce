// plaza-test-utils: shared test utilities for the hub integration suites.
//
// Provides a WebSocket test client that speaks the envelope protocol and a
// couple of receive helpers the scenario tests lean on (skip keepalives,
// wait for a specific kind, assert silence).

pub mod mock_ws_client;

pub use mock_ws_client::{MockWsClient, connect_rejection_status};
