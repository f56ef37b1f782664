use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure kinds surfaced to the user, per the backend's conventions.
///
/// A call that never completes (unreachable server, timeout, undecodable
/// body) is a transport error and always displays as "Server error". A call
/// the backend answered with a failure is a rejection and displays the
/// backend's own message when it sent one.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Server error")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Rejected(String),
}

// Failure body shape used by the create/update endpoints. The lifecycle
// endpoints fail with plain text instead, which lands on the fallback.
#[derive(Debug, Deserialize)]
struct Rejection {
    #[serde(default)]
    error: String,
}

fn rejection_message(body: &[u8], fallback: &str) -> String {
    match serde_json::from_slice::<Rejection>(body) {
        Ok(r) if !r.error.is_empty() => r.error,
        _ => fallback.to_string(),
    }
}

async fn check(resp: reqwest::Response, fallback: &str) -> Result<reqwest::Response, ApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await?;
    Err(ApiError::Rejected(rejection_message(&body, fallback)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    Running,
    Stopped,
}

impl TunnelStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TunnelStatus::Running => "●",
            TunnelStatus::Stopped => "○",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TunnelStatus::Running => "RUNNING",
            TunnelStatus::Stopped => "STOPPED",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tunnel {
    pub name: String,
    pub domain: String,
    pub port: u16,
    pub status: TunnelStatus,
    // Resource metrics are reported only while the tunnel process runs.
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub memory: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub proxied: bool,
}

// The create and update payloads name the pointed-at value differently
// (`target` vs `content`). That asymmetry is the backend's contract; keeping
// two request types makes it impossible to send the wrong field name.
#[derive(Debug, Serialize)]
pub struct CreateDnsRecordRequest {
    pub subdomain: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub target: String,
    pub proxied: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateDnsRecordRequest {
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub proxied: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateTunnelRequest {
    pub subdomain: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
struct CreateTunnelResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// Outcome of a tunnel create. The server answers with the created record,
// but older builds answer with just a message, so the name is optional.
#[derive(Debug)]
pub struct CreatedTunnel {
    pub name: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct ChangePasswordResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    pub uptime: String,
}

/// Typed client for the control server's REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn list_dns_records(&self) -> Result<Vec<DnsRecord>, ApiError> {
        let url = format!("{}/api/dns/records", self.base);
        let resp = self.http.get(&url).send().await?;
        let resp = check(resp, "Failed to fetch DNS records").await?;
        Ok(resp.json().await?)
    }

    pub async fn create_dns_record(&self, req: &CreateDnsRecordRequest) -> Result<(), ApiError> {
        let url = format!("{}/api/dns/records", self.base);
        let resp = self.http.post(&url).json(req).send().await?;
        check(resp, "Failed to create DNS record").await?;
        Ok(())
    }

    pub async fn update_dns_record(
        &self,
        id: &str,
        req: &UpdateDnsRecordRequest,
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/dns/records/{}", self.base, id);
        let resp = self.http.put(&url).json(req).send().await?;
        check(resp, "Failed to update DNS record").await?;
        Ok(())
    }

    pub async fn delete_dns_record(&self, id: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/dns/records/{}", self.base, id);
        let resp = self.http.delete(&url).send().await?;
        check(resp, "Failed to delete DNS record").await?;
        Ok(())
    }

    pub async fn list_tunnels(&self) -> Result<Vec<Tunnel>, ApiError> {
        let url = format!("{}/api/tunnels", self.base);
        let resp = self.http.get(&url).send().await?;
        let resp = check(resp, "Failed to fetch tunnels").await?;
        Ok(resp.json().await?)
    }

    pub async fn create_tunnel(
        &self,
        req: &CreateTunnelRequest,
    ) -> Result<CreatedTunnel, ApiError> {
        let url = format!("{}/api/tunnels", self.base);
        let resp = self.http.post(&url).json(req).send().await?;
        let resp = check(resp, "Failed to create tunnel").await?;
        let body: CreateTunnelResponse = resp.json().await?;
        Ok(CreatedTunnel {
            name: body.name,
            message: body
                .message
                .unwrap_or_else(|| "Tunnel created successfully".to_string()),
        })
    }

    pub async fn start_tunnel(&self, name: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/tunnels/{}/start", self.base, name);
        let resp = self.http.post(&url).send().await?;
        check(resp, "Failed to start tunnel").await?;
        Ok(())
    }

    pub async fn stop_tunnel(&self, name: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/tunnels/{}/stop", self.base, name);
        let resp = self.http.post(&url).send().await?;
        check(resp, "Failed to stop tunnel").await?;
        Ok(())
    }

    pub async fn delete_tunnel(&self, name: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/tunnels/{}", self.base, name);
        let resp = self.http.delete(&url).send().await?;
        check(resp, "Failed to delete tunnel").await?;
        Ok(())
    }

    pub async fn tunnel_status(&self, name: &str) -> Result<Tunnel, ApiError> {
        let url = format!("{}/api/tunnels/{}/status", self.base, name);
        let resp = self.http.get(&url).send().await?;
        let resp = check(resp, "Failed to fetch tunnel status").await?;
        Ok(resp.json().await?)
    }

    pub async fn system_status(&self) -> Result<SystemStatus, ApiError> {
        let url = format!("{}/api/status", self.base);
        let resp = self.http.get(&url).send().await?;
        let resp = check(resp, "Failed to fetch server status").await?;
        Ok(resp.json().await?)
    }

    // This endpoint reports rejection in its body with a 2xx-or-401 status,
    // so it is judged on the `success` flag rather than the HTTP status.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/change-password", self.base);
        let req = ChangePasswordRequest {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        let resp = self.http.post(&url).json(&req).send().await?;
        let body: ChangePasswordResponse = resp.json().await?;
        if body.success {
            return Ok(());
        }
        match body.error {
            Some(msg) if !msg.is_empty() => Err(ApiError::Rejected(msg)),
            _ => Err(ApiError::Rejected("Failed to change password".to_string())),
        }
    }

    // The redirect target only matters to browsers; completing the call is
    // what clears the server-side session.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let url = format!("{}/api/logout", self.base);
        self.http.get(&url).send().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dns_payload_uses_target() {
        let req = CreateDnsRecordRequest {
            subdomain: "test".to_string(),
            record_type: "A".to_string(),
            target: "1.2.3.4".to_string(),
            proxied: true,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["subdomain"], "test");
        assert_eq!(value["type"], "A");
        assert_eq!(value["target"], "1.2.3.4");
        assert_eq!(value["proxied"], true);
        assert!(value.get("content").is_none());
    }

    #[test]
    fn test_update_dns_payload_uses_content() {
        let req = UpdateDnsRecordRequest {
            record_type: "CNAME".to_string(),
            content: "origin.example.com".to_string(),
            proxied: false,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "CNAME");
        assert_eq!(value["content"], "origin.example.com");
        assert!(value.get("target").is_none());
        assert!(value.get("subdomain").is_none());
    }

    #[test]
    fn test_change_password_payload_keys() {
        let req = ChangePasswordRequest {
            old_password: "old".to_string(),
            new_password: "new".to_string(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["oldPassword"], "old");
        assert_eq!(value["newPassword"], "new");
    }

    #[test]
    fn test_rejection_message_prefers_backend_error() {
        let body = br#"{"error": "subdomain already in use"}"#;
        assert_eq!(
            rejection_message(body, "Failed to create tunnel"),
            "subdomain already in use"
        );
    }

    #[test]
    fn test_rejection_message_falls_back_on_plain_text() {
        let body = b"tunnel not running or PID file not found";
        assert_eq!(
            rejection_message(body, "Failed to stop tunnel"),
            "Failed to stop tunnel"
        );
    }

    #[test]
    fn test_rejection_message_falls_back_on_empty_error() {
        assert_eq!(
            rejection_message(br#"{"error": ""}"#, "Failed to update DNS record"),
            "Failed to update DNS record"
        );
        assert_eq!(
            rejection_message(b"", "Failed to delete tunnel"),
            "Failed to delete tunnel"
        );
    }

    #[test]
    fn test_tunnel_deserialize_with_metrics() {
        let data = r#"{
            "name": "api",
            "id": "f81d4fae-7dec",
            "port": 3000,
            "domain": "api.example.com",
            "status": "running",
            "pid": 4242,
            "cpu": 12.5,
            "memory": 128.0,
            "created_at": "2025-11-02T10:00:00Z"
        }"#;
        let tunnel: Tunnel = serde_json::from_str(data).unwrap();
        assert_eq!(tunnel.name, "api");
        assert_eq!(tunnel.domain, "api.example.com");
        assert_eq!(tunnel.port, 3000);
        assert_eq!(tunnel.status, TunnelStatus::Running);
        assert_eq!(tunnel.cpu, Some(12.5));
        assert_eq!(tunnel.memory, Some(128.0));
    }

    #[test]
    fn test_tunnel_deserialize_without_metrics() {
        let data = r#"{"name": "blog", "port": 8080, "domain": "blog.example.com", "status": "stopped"}"#;
        let tunnel: Tunnel = serde_json::from_str(data).unwrap();
        assert_eq!(tunnel.status, TunnelStatus::Stopped);
        assert_eq!(tunnel.cpu, None);
        assert_eq!(tunnel.memory, None);
    }

    #[test]
    fn test_dns_record_deserialize_ignores_extras() {
        let data = r#"{
            "id": "372e67954025e0ba6aaa6d586b9e0b59",
            "type": "A",
            "name": "test.example.com",
            "content": "1.2.3.4",
            "ttl": 1,
            "proxied": true
        }"#;
        let record: DnsRecord = serde_json::from_str(data).unwrap();
        assert_eq!(record.id, "372e67954025e0ba6aaa6d586b9e0b59");
        assert_eq!(record.record_type, "A");
        assert_eq!(record.content, "1.2.3.4");
        assert!(record.proxied);
    }

    #[test]
    fn test_create_tunnel_response_message_optional() {
        let echoed: CreateTunnelResponse =
            serde_json::from_str(r#"{"name": "demo", "status": "stopped"}"#).unwrap();
        assert_eq!(echoed.name.as_deref(), Some("demo"));
        assert_eq!(echoed.message, None);

        let with_message: CreateTunnelResponse =
            serde_json::from_str(r#"{"message": "Tunnel created"}"#).unwrap();
        assert_eq!(with_message.name, None);
        assert_eq!(with_message.message.as_deref(), Some("Tunnel created"));
    }

    #[test]
    fn test_rejected_error_displays_backend_message() {
        let err = ApiError::Rejected("port already mapped".to_string());
        assert_eq!(err.to_string(), "port already mapped");
    }

    #[tokio::test]
    async fn test_transport_error_displays_generically() {
        let client = reqwest::Client::new();
        let err = client.get("not a url").send().await.unwrap_err();
        assert_eq!(ApiError::from(err).to_string(), "Server error");
    }
}
