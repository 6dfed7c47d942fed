use axum::{Json, extract::Path, response::IntoResponse};
use hookrelay_sdk::objects::RotateSecretResponse;
use hookrelay_sdk::secret::generate_endpoint_secret;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /endpoints/{id}/rotate-secret` – mint and persist a new secret.
///
/// The old secret stops verifying the moment this returns; the dispatcher
/// reads the current secret at send time. The new value appears in this
/// response and nowhere else, ever.
pub async fn rotate_secret(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let secret = generate_endpoint_secret();
    let endpoint = state
        .store
        .rotate_secret(id, secret.clone())
        .await?
        .ok_or(AdminApiError::NotFound)?;

    tracing::info!(endpoint_id = %endpoint.id, "Endpoint secret rotated");

    Ok(Json(RotateSecretResponse {
        id: endpoint.id,
        secret,
    }))
}
