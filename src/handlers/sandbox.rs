use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::sandbox::{SandboxAction, SandboxPage};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(rename = "threeDTrxCode", default)]
    pub three_d_trx_code: String,
}

#[derive(Debug, Deserialize)]
pub struct PageForm {
    #[serde(default)]
    pub payment_action: String,
}

fn page(state: &AppState) -> Result<&Arc<SandboxPage>, AppError> {
    state
        .sandbox
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Sandbox is disabled.".to_string()))
}

pub async fn show_payment_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let html = page(&state)?.show(&query.three_d_trx_code).await?;
    Ok(Html(html))
}

pub async fn submit_payment(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Form(form): Form<PageForm>,
) -> Result<Redirect, AppError> {
    let action = form.payment_action.parse::<SandboxAction>()?;
    let redirect = page(&state)?
        .submit(&query.three_d_trx_code, action)
        .await?;
    Ok(Redirect::to(&redirect))
}
