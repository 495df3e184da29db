// runtablesync/src/entities/client.rs
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::EntityApiConfig;
use crate::errors::{AppError, Result};

/// An entity as returned by the workspace entity listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Reference used by the batch delete endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    #[serde(rename = "entityType")]
    pub entity_type: String,
    #[serde(rename = "entityName")]
    pub entity_name: String,
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_type: entity.entity_type.clone(),
            entity_name: entity.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserDetails {
    #[serde(rename = "userEmail")]
    user_email: String,
}

/// Client for the workspace orchestration API.
pub struct EntityClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl EntityClient {
    pub fn new(config: &EntityApiConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&base)?,
            access_token: config.access_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn workspace_endpoint(&self, namespace: &str, workspace: &str, rest: &str) -> Result<Url> {
        self.endpoint(&format!("workspaces/{}/{}/{}", namespace, workspace, rest))
    }

    /// Turns a non-2xx response into [`AppError::EntityApi`] carrying the raw body.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let endpoint = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::EntityApi {
            endpoint,
            status: status.as_u16(),
            body,
        })
    }

    /// Email address of the account the access token belongs to.
    pub async fn whoami(&self) -> Result<String> {
        let url = self.endpoint("me?userDetailsOnly=true")?;
        let response = self.http.get(url).bearer_auth(&self.access_token).send().await?;
        let details: UserDetails = Self::check(response).await?.json().await?;
        Ok(details.user_email)
    }

    pub async fn get_entities(
        &self,
        namespace: &str,
        workspace: &str,
        entity_type: &str,
    ) -> Result<Vec<Entity>> {
        let url = self.workspace_endpoint(namespace, workspace, &format!("entities/{}", entity_type))?;
        tracing::debug!(%url, "Fetching entities");
        let response = self.http.get(url).bearer_auth(&self.access_token).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn delete_entities(
        &self,
        namespace: &str,
        workspace: &str,
        entities: &[EntityRef],
    ) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let url = self.workspace_endpoint(namespace, workspace, "entities/delete")?;
        tracing::debug!(%url, count = entities.len(), "Deleting entities");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(entities)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Uploads a TSV payload through the flexible import endpoint, which
    /// accepts arbitrary entity types and attribute columns.
    pub async fn upload_entities(&self, namespace: &str, workspace: &str, tsv: &str) -> Result<()> {
        let url = self.workspace_endpoint(namespace, workspace, "flexibleImportEntities")?;
        tracing::debug!(%url, bytes = tsv.len(), "Uploading entities");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .form(&[("entities", tsv)])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
