use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use url::Url;

use drover_core::types::{BatchChange, Changeset, Namespace, NamespaceKind};
use drover_store::ReconcilerStore;

use crate::ExecutorError;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ExternalUrlError(pub String);

/// Resolves the externally reachable base URL of the owning platform,
/// injected rather than read from any global client state.
#[async_trait]
pub trait ExternalUrlSource: Send + Sync {
    async fn external_url(&self) -> Result<String, ExternalUrlError>;
}

fn link_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{\{\s*batch_change_link\s*\}\}").unwrap())
}

/// Substitute the back-link for the placeholder token, or append it after
/// two newlines when the body carries no token.
fn apply_link(body: &str, link: &str) -> String {
    if link_token().is_match(body) {
        link_token().replace_all(body, link).into_owned()
    } else {
        format!("{body}\n\n{link}")
    }
}

/// Weave a back-link to the owning batch change into the changeset body
/// that gets sent to the code host.
pub async fn decorate_changeset_body(
    store: &dyn ReconcilerStore,
    urls: &dyn ExternalUrlSource,
    changeset: &Changeset,
    body: &str,
) -> Result<String, ExecutorError> {
    let Some(owner) = changeset.owned_by_batch_change_id else {
        // Imported changesets have no campaign to link back to.
        return Ok(body.to_string());
    };
    let batch_change = store.get_batch_change(owner).await?;
    let namespace = store.get_namespace(batch_change.namespace_id).await?;
    let url = batch_change_url(urls, &namespace, &batch_change).await?;
    let link = format!(
        "[_Created by Sourcegraph batch change `{}/{}`._]({url})",
        namespace.name, batch_change.name
    );
    Ok(apply_link(body, &link))
}

/// Web URL of a batch change on the owning platform.
pub async fn batch_change_url(
    urls: &dyn ExternalUrlSource,
    namespace: &Namespace,
    batch_change: &BatchChange,
) -> Result<String, ExecutorError> {
    let external = urls
        .external_url()
        .await
        .map_err(|err| ExecutorError::ExternalUrl(err.to_string()))?;
    let base = Url::parse(&external)?;
    let joined = base.join(&format!(
        "{}/batch-changes/{}",
        namespace_url(namespace),
        batch_change.name
    ))?;
    Ok(joined.to_string())
}

pub fn namespace_url(namespace: &Namespace) -> String {
    match namespace.kind {
        NamespaceKind::Organization => format!("/organizations/{}", namespace.name),
        NamespaceKind::User => format!("/users/{}", namespace.name),
    }
}
