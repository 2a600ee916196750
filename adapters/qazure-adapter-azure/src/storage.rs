//! Blob storage access for job payloads.
//!
//! Jobs carry their program and output in a per-job container. Container
//! SAS URIs come either from the workspace's linked storage
//! (`storage/sasUri`) or from a user-supplied connection string that already
//! carries a shared access signature.

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::error::{AzureApiError, AzureApiResult};

/// A parsed storage connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    blob_endpoint: Option<String>,
    sas: Option<String>,
    account_name: Option<String>,
    has_account_key: bool,
    protocol: String,
    endpoint_suffix: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("blob_endpoint", &self.blob_endpoint)
            .field("account_name", &self.account_name)
            .field("sas", &self.sas.as_ref().map(|_| "[REDACTED]"))
            .field("has_account_key", &self.has_account_key)
            .finish()
    }
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value` pairs. Keys are case-insensitive.
    pub fn parse(raw: &str) -> AzureApiResult<Self> {
        let mut parsed = Self {
            blob_endpoint: None,
            sas: None,
            account_name: None,
            has_account_key: false,
            protocol: "https".to_string(),
            endpoint_suffix: "core.windows.net".to_string(),
        };

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                AzureApiError::InvalidConnectionString(format!("segment without '=': {part}"))
            })?;
            match key.to_ascii_lowercase().as_str() {
                "blobendpoint" => parsed.blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                "sharedaccesssignature" => parsed.sas = Some(value.trim_start_matches('?').to_string()),
                "accountname" => parsed.account_name = Some(value.to_string()),
                "accountkey" => parsed.has_account_key = true,
                "defaultendpointsprotocol" => parsed.protocol = value.to_string(),
                "endpointsuffix" => parsed.endpoint_suffix = value.to_string(),
                _ => {}
            }
        }

        if parsed.blob_endpoint.is_none() && parsed.account_name.is_none() {
            return Err(AzureApiError::InvalidConnectionString(
                "neither BlobEndpoint nor AccountName is set".into(),
            ));
        }
        Ok(parsed)
    }

    /// Blob service endpoint.
    pub fn blob_endpoint(&self) -> Option<String> {
        self.blob_endpoint.clone().or_else(|| {
            self.account_name.as_ref().map(|account| {
                format!("{}://{}.blob.{}", self.protocol, account, self.endpoint_suffix)
            })
        })
    }

    /// Whether the string carries an account key (and no SAS).
    pub fn is_account_key(&self) -> bool {
        self.has_account_key && self.sas.is_none()
    }

    /// Container SAS URI, when the string carries a shared access signature.
    pub fn container_sas_uri(&self, container: &str) -> Option<String> {
        let sas = self.sas.as_ref()?;
        let endpoint = self.blob_endpoint()?;
        Some(format!("{endpoint}/{container}?{sas}"))
    }
}

/// URI of a blob inside a container SAS URI, keeping the signature.
pub fn blob_uri(container_sas_uri: &str, blob: &str) -> String {
    match container_sas_uri.split_once('?') {
        Some((base, query)) => format!("{}/{}?{}", base.trim_end_matches('/'), blob, query),
        None => format!("{}/{}", container_sas_uri.trim_end_matches('/'), blob),
    }
}

fn with_query(uri: &str, extra: &str) -> String {
    if uri.contains('?') {
        format!("{uri}&{extra}")
    } else {
        format!("{uri}?{extra}")
    }
}

/// Create a container. An existing container is not an error.
#[instrument(skip(client, container_sas_uri))]
pub async fn create_container(client: &Client, container_sas_uri: &str) -> AzureApiResult<()> {
    let resp = client
        .put(with_query(container_sas_uri, "restype=container"))
        .header("x-ms-version", "2020-10-02")
        .header("Content-Length", "0")
        .send()
        .await?;
    match resp.status() {
        s if s.is_success() => Ok(()),
        StatusCode::CONFLICT => {
            debug!("container already exists");
            Ok(())
        }
        s => Err(AzureApiError::Storage(format!(
            "Failed to create container ({s}): {}",
            resp.text().await.unwrap_or_default()
        ))),
    }
}

/// Upload a block blob.
#[instrument(skip(client, blob_sas_uri, data), fields(bytes = data.len()))]
pub async fn upload_blob(
    client: &Client,
    blob_sas_uri: &str,
    content_type: &str,
    data: Vec<u8>,
) -> AzureApiResult<()> {
    let resp = client
        .put(blob_sas_uri)
        .header("x-ms-blob-type", "BlockBlob")
        .header("x-ms-version", "2020-10-02")
        .header("Content-Type", content_type)
        .body(data)
        .send()
        .await?;
    if resp.status().is_success() {
        Ok(())
    } else {
        let status = resp.status();
        Err(AzureApiError::Storage(format!(
            "Failed to upload blob ({status}): {}",
            resp.text().await.unwrap_or_default()
        )))
    }
}

/// Download a blob.
#[instrument(skip(client, blob_sas_uri))]
pub async fn download_blob(client: &Client, blob_sas_uri: &str) -> AzureApiResult<Vec<u8>> {
    let resp = client
        .get(blob_sas_uri)
        .header("x-ms-version", "2020-10-02")
        .send()
        .await?;
    match resp.status() {
        s if s.is_success() => Ok(resp.bytes().await?.to_vec()),
        StatusCode::NOT_FOUND => Err(AzureApiError::NotFound("blob".into())),
        s => Err(AzureApiError::Storage(format!("Failed to download blob ({s})"))),
    }
}
