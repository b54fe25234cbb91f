use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::Redirect,
    Form,
};

use crate::error::AppError;
use crate::services::CallbackParams;
use crate::AppState;

/// Processor callback delivered as a browser redirect (query string only).
pub async fn callback_get(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    handle(&state, CallbackParams::merged(query, HashMap::new())).await
}

/// Processor callback delivered as a form post. Form fields take precedence
/// over query parameters with the same name.
pub async fn callback_post(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    form: Option<Form<HashMap<String, String>>>,
) -> Result<Redirect, AppError> {
    let form = form.map(|Form(fields)| fields).unwrap_or_default();
    handle(&state, CallbackParams::merged(query, form)).await
}

async fn handle(state: &AppState, params: CallbackParams) -> Result<Redirect, AppError> {
    let outcome = state.callbacks.handle(params).await?;
    Ok(Redirect::to(outcome.redirect_url()))
}
