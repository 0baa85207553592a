//! Custom domain handlers

use tracing::info;

use crate::errors::AgentError;
use crate::handlers::into_result;
use crate::kube::{driver, manifests};
use crate::models::command::CommandResult;
use crate::models::payloads::DomainPayload;
use crate::utils::validate_name;

/// Per-domain Ingress name; derived from the domain so removal needs no
/// lookup and stays idempotent.
pub fn ingress_name(app: &str, domain: &str) -> String {
    format!("{}-domain-{}", app, domain.replace('.', "-"))
}

pub async fn add(payload: DomainPayload) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("app name", &payload.app_name)?;
    validate_name("domain", &payload.domain)?;

    info!(
        "Adding custom domain {} to {}/{}",
        payload.domain, payload.namespace, payload.app_name
    );

    let manifest = manifests::app_ingress(
        &payload.namespace,
        &payload.app_name,
        &ingress_name(&payload.app_name, &payload.domain),
        &payload.domain,
    );
    let result = driver::apply_manifest(&manifest).await;
    Ok(into_result("add custom domain", result))
}

pub async fn remove(payload: DomainPayload) -> Result<CommandResult, AgentError> {
    validate_name("namespace", &payload.namespace)?;
    validate_name("app name", &payload.app_name)?;
    validate_name("domain", &payload.domain)?;

    info!(
        "Removing custom domain {} from {}/{}",
        payload.domain, payload.namespace, payload.app_name
    );

    let result = driver::delete_object(
        &payload.namespace,
        "ingress",
        &ingress_name(&payload.app_name, &payload.domain),
    )
    .await;
    Ok(into_result("remove custom domain", result))
}
