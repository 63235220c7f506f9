use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use rolesync_application::RoleStore;
use rolesync_core::{ApiToken, AppError, AppResult};
use rolesync_domain::{Member, Role, RoleRecord};

#[derive(Debug, Deserialize)]
struct RoleListResponse {
    roles: Vec<RoleRecord>,
}

#[derive(Debug, Deserialize)]
struct MemberListResponse {
    members: Vec<Member>,
}

#[derive(Debug, Serialize)]
struct InvitationRequest<'a> {
    identity: &'a str,
    role_id: &'a str,
}

/// Role store backed by the remote authority's HTTP API.
pub struct HttpRoleStore {
    http_client: reqwest::Client,
    base_url: Url,
    token: ApiToken,
}

impl HttpRoleStore {
    /// Creates a store for an API base URL.
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: Url, token: ApiToken) -> Self {
        Self {
            http_client,
            base_url,
            token,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Validation(format!(
                    "api base url '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> AppResult<Response> {
        let request = request.bearer_auth(self.token.expose());
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            response = request.send() => response.map_err(transport_error)?,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            body = response.text() => {
                body.unwrap_or_else(|_| "<response body unavailable>".to_owned())
            }
        };
        debug!(status = status.as_u16(), body = %body, "remote api rejected request");
        Err(AppError::from_status(status.as_u16(), body))
    }

    async fn send_json<T>(&self, request: RequestBuilder, cancel: &CancellationToken) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, cancel).await?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(cancelled()),
            body = response.json::<T>() => body.map_err(|error| {
                AppError::Internal(format!("failed to parse remote api response body: {error}"))
            }),
        }
    }
}

fn cancelled() -> AppError {
    AppError::Cancelled("remote request was cancelled".to_owned())
}

fn transport_error(error: reqwest::Error) -> AppError {
    if error.is_builder() {
        return AppError::Internal(format!("failed to build remote api request: {error}"));
    }

    AppError::Network(format!("remote api request failed: {error}"))
}

fn into_roles(records: Vec<RoleRecord>) -> AppResult<Vec<Role>> {
    records.into_iter().map(Role::try_from).collect()
}

#[async_trait]
impl RoleStore for HttpRoleStore {
    async fn list_roles(&self, cancel: &CancellationToken) -> AppResult<Vec<Role>> {
        let url = self.endpoint(&["roles"])?;
        let response: RoleListResponse = self.send_json(self.http_client.get(url), cancel).await?;
        into_roles(response.roles)
    }

    async fn find_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<Option<Role>> {
        let url = self.endpoint(&["roles", name])?;
        match self
            .send_json::<RoleRecord>(self.http_client.get(url), cancel)
            .await
        {
            Ok(record) => Role::try_from(record).map(Some),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn create_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role> {
        let url = self.endpoint(&["roles"])?;
        let record: RoleRecord = self
            .send_json(
                self.http_client.post(url).json(&RoleRecord::from(role)),
                cancel,
            )
            .await?;
        Role::try_from(record)
    }

    async fn update_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role> {
        let role_id = role.id().ok_or_else(|| {
            AppError::Validation(format!(
                "role '{}' cannot be updated without a remote identifier",
                role.name()
            ))
        })?;
        let url = self.endpoint(&["roles", role_id])?;
        let record: RoleRecord = self
            .send_json(
                self.http_client.put(url).json(&RoleRecord::from(role)),
                cancel,
            )
            .await?;
        Role::try_from(record)
    }

    async fn delete_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<()> {
        let url = self.endpoint(&["roles", name])?;
        self.send(self.http_client.delete(url), cancel).await?;
        Ok(())
    }

    async fn list_members(&self, cancel: &CancellationToken) -> AppResult<Vec<Member>> {
        let url = self.endpoint(&["members"])?;
        let response: MemberListResponse =
            self.send_json(self.http_client.get(url), cancel).await?;
        Ok(response.members)
    }

    async fn invite_member(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let url = self.endpoint(&["members", "invitations"])?;
        let response = self
            .send(
                self.http_client
                    .post(url)
                    .json(&InvitationRequest { identity, role_id }),
                cancel,
            )
            .await?;

        if response.status() == StatusCode::ACCEPTED {
            debug!(identity, "invitation queued by remote authority");
        }
        Ok(())
    }

    async fn assign_member_role(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let url = self.endpoint(&["members", identity, "roles", role_id])?;
        self.send(self.http_client.put(url), cancel).await?;
        Ok(())
    }
}
