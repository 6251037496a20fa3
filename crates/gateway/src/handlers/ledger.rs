//! Event and ingress package listings

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use spf_common::{
    auth::ActorContext,
    errors::Result,
    records::{Event, IngressPackage},
};

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `all_users` widens the listing for privileged users
    pub scope: Option<String>,
}

/// Events, newest first
pub async fn list_events(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Event>>> {
    let events = state
        .pipelines
        .ledger()
        .events(actor.scope(query.scope.as_deref()))
        .await?;
    Ok(Json(events))
}

/// Received packages, newest first
pub async fn list_ingress_packages(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<IngressPackage>>> {
    let packages = state
        .pipelines
        .ledger()
        .ingress_packages(actor.scope(query.scope.as_deref()))
        .await?;
    Ok(Json(packages))
}
