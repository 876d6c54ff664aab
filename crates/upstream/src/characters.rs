//! Client for the character service.
//!
//! - `GET {base}/characters/{id}`
//! - `GET {base}/characters?name={name}`
//!
//! Both return a single character record; `404` means no such character.

use async_trait::async_trait;
use handoff_core::character::{
    CharacterDirectory, CharacterRecord, CharacterTarget, DirectoryError,
};
use reqwest::StatusCode;

use crate::{ensure_success, UpstreamError};

/// [`CharacterDirectory`] backed by the character service's REST API.
pub struct HttpCharacterDirectory {
    client: reqwest::Client,
    base_url: String,
    /// Service credential sent as a Bearer token, if configured.
    token: Option<String>,
}

impl HttpCharacterDirectory {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, target: &CharacterTarget) -> reqwest::RequestBuilder {
        let builder = match target {
            CharacterTarget::ById(id) => {
                self.client.get(format!("{}/characters/{id}", self.base_url))
            }
            CharacterTarget::ByName(name) => self
                .client
                .get(format!("{}/characters", self.base_url))
                .query(&[("name", name.as_str())]),
        };
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn fetch(
        &self,
        target: &CharacterTarget,
    ) -> Result<Option<CharacterRecord>, UpstreamError> {
        let response = self.request(target).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl CharacterDirectory for HttpCharacterDirectory {
    async fn get_character(
        &self,
        target: &CharacterTarget,
    ) -> Result<Option<CharacterRecord>, DirectoryError> {
        self.fetch(target).await.map_err(|e| {
            tracing::error!(error = %e, target = %target, "Character lookup failed");
            DirectoryError::Unavailable(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_urls_follow_target_kind() {
        let directory = HttpCharacterDirectory::new("http://characters:8080/", None);

        let by_id = directory.request(&CharacterTarget::ById(7)).build().unwrap();
        assert_eq!(by_id.url().as_str(), "http://characters:8080/characters/7");

        let by_name = directory
            .request(&CharacterTarget::ByName("Aria Vell".to_string()))
            .build()
            .unwrap();
        assert_eq!(
            by_name.url().as_str(),
            "http://characters:8080/characters?name=Aria+Vell"
        );
    }

    #[test]
    fn service_token_is_sent_as_bearer() {
        let directory =
            HttpCharacterDirectory::new("http://characters:8080", Some("svc-token".to_string()));
        let request = directory.request(&CharacterTarget::ById(7)).build().unwrap();
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer svc-token"
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let directory = HttpCharacterDirectory::new("http://127.0.0.1:9", None);
        let result = directory.get_character(&CharacterTarget::ById(1)).await;
        assert!(matches!(result, Err(DirectoryError::Unavailable(_))));
    }
}
