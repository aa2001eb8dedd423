use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::error::ApiError;
use super::retry::{retry, retry_error};
use super::signer::{self, Credentials};

/// Cloud services this provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Vpc,
    Tag,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Vpc => "vpc",
            Service::Tag => "tag",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Service::Vpc => "2017-03-12",
            Service::Tag => "2018-08-13",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total transport attempts per call, the first one included
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

/// Everything needed to build a [`Client`]
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub region: String,
    pub protocol: String,
    pub domain: String,
    /// Full URL that replaces the per-service endpoint
    pub endpoint: Option<String>,
    /// Calls per second allowed for a single action
    pub rate_limit: u32,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Interval between polls of an asynchronous operation
    pub poll_interval: Duration,
    pub retry_config: RetryConfig,
}

pub const DEFAULT_READ_RETRY_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_RATE_LIMIT: u32 = 20;

impl ClientConfig {
    pub fn new(secret_id: &str, secret_key: &str, region: &str) -> Self {
        Self {
            credentials: Credentials {
                secret_id: secret_id.to_string(),
                secret_key: secret_key.to_string(),
                security_token: None,
            },
            region: region.to_string(),
            protocol: "HTTPS".to_string(),
            domain: "tencentcloudapi.com".to_string(),
            endpoint: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            read_timeout: DEFAULT_READ_RETRY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_RETRY_TIMEOUT,
            poll_interval: Duration::from_secs(3),
            retry_config: RetryConfig::default(),
        }
    }

    /// Applies `TENCENTCLOUD_READ_RETRY_TIMEOUT`, `TENCENTCLOUD_WRITE_RETRY_TIMEOUT`
    /// and `TENCENTCLOUD_RATE_LIMIT`; unparsable values keep the defaults
    pub fn with_env_tuning(mut self) -> Self {
        let secs = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };
        if let Some(v) = secs("TENCENTCLOUD_READ_RETRY_TIMEOUT") {
            self.read_timeout = Duration::from_secs(v);
        }
        if let Some(v) = secs("TENCENTCLOUD_WRITE_RETRY_TIMEOUT") {
            self.write_timeout = Duration::from_secs(v);
        }
        if let Some(v) = secs("TENCENTCLOUD_RATE_LIMIT") {
            self.rate_limit = v as u32;
        }
        self
    }

    fn service_url(&self, service: Service) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "{}://{}.{}",
                self.protocol.to_lowercase(),
                service.name(),
                self.domain
            ),
        }
    }
}

/// Fixed one-second window counter per action
struct RateLimiter {
    limit: u32,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    async fn check(&self, action: &str) {
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let now = Instant::now();
                let entry = windows.entry(action.to_string()).or_insert((now, 0));
                if now.duration_since(entry.0) >= Duration::from_secs(1) {
                    *entry = (now, 0);
                }
                if entry.1 < self.limit {
                    entry.1 += 1;
                    return;
                }
                Duration::from_secs(1).saturating_sub(now.duration_since(entry.0))
            };
            tracing::debug!(action, wait_ms = wait.as_millis() as u64, "rate limited");
            tokio::time::sleep(wait).await;
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CloudError {
    code: String,
    message: String,
}

/// Tencent Cloud API v3 client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    config: ClientConfig,
    limiter: RateLimiter,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.retry_config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                limiter: RateLimiter::new(config.rate_limit),
                config,
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.inner.config.region
    }

    pub fn read_timeout(&self) -> Duration {
        self.inner.config.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.inner.config.write_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.config.poll_interval
    }

    /// Calls a VPC action
    pub async fn call<B, T>(&self, action: &str, request: &B) -> Result<T, ApiError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.call_service(Service::Vpc, action, request).await
    }

    /// Signs and POSTs one action, retrying transport failures
    pub async fn call_service<B, T>(
        &self,
        service: Service,
        action: &str,
        request: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(request).map_err(|e| ApiError::ParseError(e.to_string()))?;
        let url = self.inner.config.service_url(service);
        let host = url::Url::parse(&url)
            .ok()
            .and_then(|u| {
                u.host_str().map(|h| match u.port() {
                    Some(port) => format!("{}:{}", h, port),
                    None => h.to_string(),
                })
            })
            .ok_or_else(|| ApiError::Signing(format!("invalid endpoint {}", url)))?;

        self.inner.limiter.check(action).await;

        let retry = &self.inner.config.retry_config;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < retry.max_attempts {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    retry.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    retry.max_backoff_ms,
                );
                tracing::debug!(
                    action,
                    backoff_ms = backoff,
                    attempt,
                    "retrying request after transport failure"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            attempt += 1;

            let timestamp = chrono::Utc::now().timestamp();
            let authorization = signer::authorization(
                &self.inner.config.credentials,
                service.name(),
                &host,
                timestamp,
                &body,
            )?;

            let mut builder = self
                .inner
                .http_client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, signer::CONTENT_TYPE)
                .header(reqwest::header::HOST, &host)
                .header(reqwest::header::AUTHORIZATION, authorization)
                .header("X-TC-Action", action)
                .header("X-TC-Version", service.version())
                .header("X-TC-Timestamp", timestamp.to_string())
                .header("X-TC-Region", &self.inner.config.region)
                .header("X-TC-Language", "en-US");
            if let Some(token) = &self.inner.config.credentials.security_token {
                builder = builder.header("X-TC-Token", token);
            }

            let response = match builder.body(body.clone()).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    last_error = Some(ApiError::Timeout(retry.timeout_seconds));
                    continue;
                }
                Err(e) if e.is_connect() || e.is_request() => {
                    last_error = Some(ApiError::ServiceUnavailable);
                    continue;
                }
                Err(e) => return Err(ApiError::RequestError(e)),
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = Some(ApiError::RateLimited);
                continue;
            }
            if status.is_server_error() {
                last_error = Some(ApiError::ServiceUnavailable);
                continue;
            }

            let text = response.text().await?;
            let request_body = String::from_utf8_lossy(&body);
            return match parse_response(&text) {
                Ok(value) => {
                    tracing::debug!(
                        action,
                        request = %request_body,
                        response = %text,
                        "api call succeeded"
                    );
                    serde_json::from_value(value).map_err(|e| {
                        tracing::error!(action, error = %e, body = %text, "failed to deserialize response");
                        ApiError::ParseError(format!("{}: {}", action, e))
                    })
                }
                Err(e) => {
                    tracing::error!(
                        action,
                        request = %request_body,
                        reason = %e,
                        "api call failed"
                    );
                    Err(e)
                }
            };
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Calls a VPC action under the read retry timeout
    pub async fn read<B, T>(&self, action: &str, request: &B) -> Result<T, ApiError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.call_with_retry(Service::Vpc, action, request, self.read_timeout(), &[])
            .await
    }

    /// Calls a VPC action under the write retry timeout; `extra` codes are
    /// retried on top of the common ones
    pub async fn write<B, T>(&self, action: &str, request: &B, extra: &[&str]) -> Result<T, ApiError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.call_with_retry(Service::Vpc, action, request, self.write_timeout(), extra)
            .await
    }

    pub async fn call_with_retry<B, T>(
        &self,
        service: Service,
        action: &str,
        request: &B,
        timeout: Duration,
        extra: &[&str],
    ) -> Result<T, ApiError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        retry(timeout, move || async move {
            self.call_service(service, action, request)
                .await
                .map_err(|e| retry_error(e, extra))
        })
        .await
    }

    pub fn vpcs(&self) -> super::vpc::VpcApi<'_> {
        super::vpc::VpcApi::new(self)
    }

    pub fn subnets(&self) -> super::subnet::SubnetApi<'_> {
        super::subnet::SubnetApi::new(self)
    }

    pub fn route_tables(&self) -> super::route_table::RouteTableApi<'_> {
        super::route_table::RouteTableApi::new(self)
    }

    pub fn security_groups(&self) -> super::security_group::SecurityGroupApi<'_> {
        super::security_group::SecurityGroupApi::new(self)
    }

    pub fn nat_gateways(&self) -> super::nat_gateway::NatGatewayApi<'_> {
        super::nat_gateway::NatGatewayApi::new(self)
    }

    pub fn enis(&self) -> super::eni::EniApi<'_> {
        super::eni::EniApi::new(self)
    }

    pub fn ha_vips(&self) -> super::ha_vip::HaVipApi<'_> {
        super::ha_vip::HaVipApi::new(self)
    }

    pub fn bandwidth_packages(&self) -> super::bandwidth_package::BandwidthPackageApi<'_> {
        super::bandwidth_package::BandwidthPackageApi::new(self)
    }

    pub fn private_nat(&self) -> super::private_nat::PrivateNatApi<'_> {
        super::private_nat::PrivateNatApi::new(self)
    }

    pub fn network_acls(&self) -> super::network_acl::NetworkAclApi<'_> {
        super::network_acl::NetworkAclApi::new(self)
    }

    pub fn addresses(&self) -> super::address::AddressApi<'_> {
        super::address::AddressApi::new(self)
    }

    pub fn tags(&self) -> super::tag::TagApi<'_> {
        super::tag::TagApi::new(self)
    }

    pub fn tasks(&self) -> super::task::TaskApi<'_> {
        super::task::TaskApi::new(self)
    }
}

/// Unwraps `{"Response": {...}}`, turning `Response.Error` into [`ApiError::Cloud`]
fn parse_response(text: &str) -> Result<serde_json::Value, ApiError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ApiError::ParseError(e.to_string()))?;
    let mut response = envelope.response;

    if let Some(error) = response.get("Error") {
        let error: CloudError = serde_json::from_value(error.clone())
            .map_err(|e| ApiError::ParseError(format!("malformed error: {}", e)))?;
        let request_id = response
            .get("RequestId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(ApiError::Cloud {
            code: error.code,
            message: error.message,
            request_id,
        });
    }

    if let Some(map) = response.as_object_mut() {
        map.entry("RequestId")
            .or_insert_with(|| serde_json::Value::String(String::new()));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Echo {
        request_id: String,
        #[serde(default)]
        total_count: u64,
    }

    fn test_config(url: &str) -> ClientConfig {
        let mut config = ClientConfig::new("AKIDtest", "secret", "ap-guangzhou");
        config.endpoint = Some(url.to_string());
        config.retry_config.initial_backoff_ms = 1;
        config
    }

    #[tokio::test]
    async fn call_sends_signed_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeVpcs")
            .match_header("x-tc-version", "2017-03-12")
            .match_header("x-tc-region", "ap-guangzhou")
            .match_header("x-tc-language", "en-US")
            .match_header(
                "authorization",
                Matcher::Regex(
                    r"^TC3-HMAC-SHA256 Credential=AKIDtest/\d{4}-\d{2}-\d{2}/vpc/tc3_request, SignedHeaders=content-type;host, Signature=[0-9a-f]{64}$"
                        .to_string(),
                ),
            )
            .match_body(Matcher::Json(json!({"Limit": "100"})))
            .with_body(r#"{"Response":{"TotalCount":3,"RequestId":"req-1"}}"#)
            .create_async()
            .await;

        let client = Client::new(test_config(&server.url())).unwrap();
        let echo: Echo = client
            .call("DescribeVpcs", &json!({"Limit": "100"}))
            .await
            .unwrap();

        assert_eq!(echo.request_id, "req-1");
        assert_eq!(echo.total_count, 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn call_maps_cloud_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(
                r#"{"Response":{"Error":{"Code":"VPCNotFound","Message":"no vpc"},"RequestId":"req-2"}}"#,
            )
            .create_async()
            .await;

        let client = Client::new(test_config(&server.url())).unwrap();
        let result: Result<Echo, _> = client.call("DescribeVpcs", &json!({})).await;

        match result {
            Err(ApiError::Cloud {
                code, request_id, ..
            }) => {
                assert_eq!(code, "VPCNotFound");
                assert_eq!(request_id, "req-2");
            }
            _ => panic!("expected cloud error"),
        }
    }

    #[tokio::test]
    async fn call_retries_server_errors() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = Client::new(test_config(&server.url())).unwrap();
        let result: Result<Echo, _> = client.call("DescribeVpcs", &json!({})).await;

        assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_header_is_sent_when_set() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-token", "sts-token")
            .with_body(r#"{"Response":{"RequestId":"req-3"}}"#)
            .create_async()
            .await;

        let mut config = test_config(&server.url());
        config.credentials.security_token = Some("sts-token".to_string());
        let client = Client::new(config).unwrap();
        let _: Echo = client.call("DeleteVpc", &json!({})).await.unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn service_url_from_domain() {
        let config = ClientConfig::new("id", "key", "ap-shanghai");
        assert_eq!(
            config.service_url(Service::Vpc),
            "https://vpc.tencentcloudapi.com"
        );
        assert_eq!(
            config.service_url(Service::Tag),
            "https://tag.tencentcloudapi.com"
        );
    }

    #[tokio::test]
    async fn rate_limiter_delays_excess_calls() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        limiter.check("CreateVpc").await;
        limiter.check("CreateVpc").await;
        limiter.check("DeleteVpc").await;
        assert!(start.elapsed() < Duration::from_millis(500));

        limiter.check("CreateVpc").await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[test]
    fn parse_response_adds_missing_request_id() {
        let value = parse_response(r#"{"Response":{"VpcSet":[]}}"#).unwrap();
        assert_eq!(value["RequestId"], "");
    }
}
