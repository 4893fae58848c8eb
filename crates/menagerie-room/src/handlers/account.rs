//! Account write-through handlers: settings and tutorial progress.
//!
//! These fields are non-critical, so the durable write is fire-and-forget:
//! the response returns immediately and a failed write is logged, not
//! surfaced. Writes may complete after the session (or the room) is gone;
//! the user store tolerates that.

use menagerie_db::UserStore;
use menagerie_types::{RoomState, SessionId};

use crate::deps::RoomDeps;
use crate::error::ActionError;

use super::{HandlerOutcome, player};

/// Persist the client settings blob against the user record.
pub fn update_settings(
    state: &RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    settings: serde_json::Value,
) -> Result<HandlerOutcome, ActionError> {
    let wallet = player(state, session_id)?.wallet_address;

    let postgres = deps.postgres.clone();
    tokio::spawn(async move {
        if let Err(e) = UserStore::new(postgres.pool())
            .save_settings(&wallet, &settings)
            .await
        {
            tracing::warn!(wallet, error = %e, "settings write failed");
        }
    });

    Ok(HandlerOutcome::new("settings saved"))
}

/// Persist tutorial progress against the user record.
pub fn update_tutorial(
    state: &RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    step: u32,
    completed: bool,
) -> Result<HandlerOutcome, ActionError> {
    let wallet = player(state, session_id)?.wallet_address;
    let step = i32::try_from(step)
        .map_err(|_| ActionError::Invalid(String::from("tutorial step out of range")))?;

    let postgres = deps.postgres.clone();
    tokio::spawn(async move {
        if let Err(e) = UserStore::new(postgres.pool())
            .save_tutorial(&wallet, step, completed)
            .await
        {
            tracing::warn!(wallet, error = %e, "tutorial write failed");
        }
    });

    Ok(HandlerOutcome::new("tutorial updated")
        .with_data(serde_json::json!({ "step": step, "completed": completed })))
}
