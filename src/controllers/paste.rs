use tracing::info;

use crate::error::ApiError;
use crate::expiration::ExpirationRequest;
use crate::models::{NewPaste, Paste};
use crate::types::api::CreatePaste;
use crate::App;

pub async fn create(app: &App, request: CreatePaste) -> crate::ApiResult<Paste> {
    let content = request
        .content
        .ok_or_else(|| ApiError::Validation("content is required".into()))?;
    let expires_at = match request.expires_at {
        Some(raw) => ExpirationRequest::try_from(raw)?.resolve(),
        None => None,
    };

    let paste = app
        .store
        .create(NewPaste {
            title: request.title,
            content,
            language: request.language,
            expires_at,
        })
        .await?;

    info!(
        "new paste: id='{id}', language='{language}', size={size}, expires_at={expires_at:?}",
        id = paste.id,
        language = paste.language,
        size = paste.content.len(),
        expires_at = paste.expires_at,
    );

    Ok(paste)
}

pub async fn fetch(app: &App, id: &str) -> crate::ApiResult<Paste> {
    Ok(app.store.get(id).await?)
}

/// Public URL of a paste.
pub fn url(app: &App, paste: &Paste) -> String {
    format!(
        "{base_url}/api/pastes/{id}",
        base_url = app.config.base_url.trim_end_matches('/'),
        id = paste.id
    )
}
