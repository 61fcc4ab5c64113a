use std::env;

use protocol::StatusResponse;
use semantic_index::StoreStatus;
use uuid::Uuid;

/// Flatten a store snapshot into the wire shape served by `/api/status`.
pub fn make_status_response(id: Uuid, status: &StoreStatus) -> StatusResponse {
    StatusResponse {
        id,
        document_count: status.document_count,
        dimension: status.dimension,
        backend: status.backend.to_string(),
        requested_backend: status.requested_backend.to_string(),
        engine: status.engine.clone(),
        gpu_enabled: status.placement.is_gpu(),
        gpu_requested: status.gpu_requested,
        model: status.model.clone(),
        languages: status
            .languages
            .iter()
            .map(|(lang, count)| (lang.display_name().to_string(), *count))
            .collect(),
        notices: status.notices.iter().map(ToString::to_string).collect(),
        served_by: Some(host_label()),
    }
}

fn host_label() -> String {
    env::var("HOSTNAME")
        .or_else(|_| env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "polyseek-server".into())
}
