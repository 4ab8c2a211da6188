//! /streams handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use orderer_services::StreamInfo;

use super::ApiState;

#[derive(Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamInfo>,
}

pub async fn handle_streams(State(state): State<ApiState>) -> Json<StreamsResponse> {
    Json(StreamsResponse {
        streams: state.broadcaster.streams().snapshot(),
    })
}
