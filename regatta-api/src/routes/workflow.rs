/// Workflow execution endpoint
///
/// A single endpoint accepts any workflow intent and runs it through the
/// orchestrator. The intent's serde tag selects the operation; the actor
/// is always an explicit id in the payload.
///
/// # Endpoint
///
/// ```text
/// POST /v1/workflow/execute
/// ```
///
/// # Request
///
/// ```json
/// {
///   "intent": "join_team",
///   "team_id": "a2b8...",
///   "user_id": "91c4..."
/// }
/// ```
///
/// # Response
///
/// The effect summary of the executed intent, e.g.
///
/// ```json
/// { "effect": "requested", "notification_ids": ["7f3e..."] }
/// ```
///
/// Denied or failed intents map to HTTP errors carrying the machine
/// reason code; see the error module.
use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use regatta_workflow::{Effect, WorkflowIntent};

/// Executes one workflow intent
pub async fn execute_intent(
    State(state): State<AppState>,
    Json(intent): Json<WorkflowIntent>,
) -> ApiResult<Json<Effect>> {
    let effect = state.orchestrator.execute(intent).await?;
    Ok(Json(effect))
}
