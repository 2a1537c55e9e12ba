//! Konnect API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::models::{
    ConfigurationRequest, ControlPlane, CreateControlPlaneRequest, CreateNetworkRequest,
    CreateTransitGatewayRequest, DataPlaneConfiguration, ListBody, Network, ProviderAccount,
    TransitGateway,
};
use crate::traits::{ControlPlaneApi, CreateOutcome, KonnectError};

/// Global API base URL (cloud gateway resources).
const GLOBAL_BASE_URL: &str = "https://global.api.konghq.com";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Kong Konnect API client.
#[derive(Clone)]
pub struct Konnect {
    /// HTTP client.
    client: Client,
    /// Personal or system access token.
    token: String,
    /// Regional API base URL (control planes).
    regional_url: String,
    /// Global API base URL (cloud gateways).
    global_url: String,
}

impl Konnect {
    /// Create a new Konnect client.
    ///
    /// # Arguments
    /// * `token` - Konnect personal or system access token
    /// * `region` - Konnect geo for regional APIs (e.g., "us", "eu")
    ///
    /// # Errors
    /// Returns error if the token is empty or the HTTP client cannot be created.
    pub fn new(token: impl Into<String>, region: &str) -> Result<Self, KonnectError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(KonnectError::Config("Konnect token is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            token,
            regional_url: format!("https://{region}.api.konghq.com"),
            global_url: GLOBAL_BASE_URL.to_string(),
        })
    }

    /// Override both API base URLs (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.regional_url.clone_from(&url);
        self.global_url = url;
        self
    }

    /// Regional API base URL.
    #[must_use]
    pub fn regional_url(&self) -> &str {
        &self.regional_url
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, KonnectError> {
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated GET request filtered by exact name.
    async fn get_by_name<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        name: &str,
    ) -> Result<T, KonnectError> {
        debug!(url = %url, name = %name, "GET request");

        let response = self
            .client
            .get(url)
            .query(&[("filter[name][eq]", name)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated PUT request.
    async fn put<T, B>(&self, url: &str, body: &B) -> Result<T, KonnectError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        debug!(url = %url, "PUT request");

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST that creates a named resource.
    ///
    /// HTTP 409 is mapped to [`CreateOutcome::Conflict`] with the literal body.
    async fn create<T, B>(&self, url: &str, body: &B) -> Result<CreateOutcome<T>, KonnectError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            debug!(url = %url, body = %body, "Create returned conflict");
            return Ok(CreateOutcome::Conflict { body });
        }

        Self::handle_response(response)
            .await
            .map(CreateOutcome::Created)
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, KonnectError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                KonnectError::Serialization(e)
            })
        } else if status == StatusCode::NOT_FOUND {
            Err(KonnectError::NotFound(text))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(KonnectError::Auth(text))
        } else {
            Err(KonnectError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl ControlPlaneApi for Konnect {
    async fn create_control_plane(
        &self,
        req: &CreateControlPlaneRequest,
    ) -> Result<CreateOutcome<ControlPlane>, KonnectError> {
        info!(name = %req.name, "Creating control plane");
        let url = format!("{}/v2/control-planes", self.regional_url);
        self.create(&url, req).await
    }

    async fn list_control_planes(&self, name: &str) -> Result<Vec<ControlPlane>, KonnectError> {
        let url = format!("{}/v2/control-planes", self.regional_url);
        let body: ListBody<ControlPlane> = self.get_by_name(&url, name).await?;
        Ok(body.into_items())
    }

    async fn create_network(
        &self,
        req: &CreateNetworkRequest,
    ) -> Result<CreateOutcome<Network>, KonnectError> {
        info!(
            name = %req.name,
            region = %req.region,
            cidr = %req.cidr_block,
            "Creating cloud gateway network"
        );
        let url = format!("{}/v2/cloud-gateways/networks", self.global_url);
        self.create(&url, req).await
    }

    async fn list_networks(&self, name: &str) -> Result<Vec<Network>, KonnectError> {
        let url = format!("{}/v2/cloud-gateways/networks", self.global_url);
        let body: ListBody<Network> = self.get_by_name(&url, name).await?;
        Ok(body.into_items())
    }

    async fn get_network(&self, id: &str) -> Result<Network, KonnectError> {
        let url = format!("{}/v2/cloud-gateways/networks/{id}", self.global_url);
        self.get(&url).await
    }

    async fn create_transit_gateway(
        &self,
        network_id: &str,
        req: &CreateTransitGatewayRequest,
    ) -> Result<CreateOutcome<TransitGateway>, KonnectError> {
        info!(
            network_id = %network_id,
            name = %req.name,
            transit_gateway_id = %req.transit_gateway_attachment_config.transit_gateway_id,
            "Requesting transit gateway attachment"
        );
        let url = format!(
            "{}/v2/cloud-gateways/networks/{network_id}/transit-gateways",
            self.global_url
        );
        self.create(&url, req).await
    }

    async fn list_transit_gateways(
        &self,
        network_id: &str,
        name: &str,
    ) -> Result<Vec<TransitGateway>, KonnectError> {
        let url = format!(
            "{}/v2/cloud-gateways/networks/{network_id}/transit-gateways",
            self.global_url
        );
        let body: ListBody<TransitGateway> = self.get_by_name(&url, name).await?;
        Ok(body.into_items())
    }

    async fn get_transit_gateway(
        &self,
        network_id: &str,
        id: &str,
    ) -> Result<TransitGateway, KonnectError> {
        let url = format!(
            "{}/v2/cloud-gateways/networks/{network_id}/transit-gateways/{id}",
            self.global_url
        );
        self.get(&url).await
    }

    async fn list_provider_accounts(&self) -> Result<Vec<ProviderAccount>, KonnectError> {
        let url = format!("{}/v2/cloud-gateways/provider-accounts", self.global_url);
        let body: ListBody<ProviderAccount> = self.get(&url).await?;
        Ok(body.into_items())
    }

    async fn put_configuration(
        &self,
        req: &ConfigurationRequest,
    ) -> Result<DataPlaneConfiguration, KonnectError> {
        info!(
            control_plane_id = %req.control_plane_id,
            groups = req.dataplane_groups.len(),
            "Putting cloud gateway configuration"
        );
        let url = format!("{}/v2/cloud-gateways/configurations", self.global_url);
        self.put(&url, req).await
    }
}
