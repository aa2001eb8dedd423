use thiserror::Error;

/// Error codes that are worth retrying for any action
pub const RETRYABLE_CODES: &[&str] = &[
    "ClientError.NetworkError",
    "ClientError.HttpStatusCodeError",
    "FailedOperation",
    "InternalError",
    "TradeUnknownError",
    "RequestLimitExceeded",
    "ResourceInUse",
    "ResourceInsufficient",
    "ResourceUnavailable",
    "ResourceBusy",
];

pub const MUTEX_TASK_RUNNING: &str = "UnsupportedOperation.MutexOperationTaskRunning";
pub const ACTION_LIMITED: &str = "LimitExceeded.ActionLimited";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
    Cloud {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Failed to sign request: {0}")]
    Signing(String),

    #[error("Task {task_id} failed: {output}")]
    TaskFailed { task_id: String, output: String },

    #[error("Inconsistent cloud state: {0}")]
    InconsistentState(String),
}

impl ApiError {
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Cloud { code, .. } => Some(code),
            _ => None,
        }
    }

    /// True for failures below the API layer: connect errors, timeouts, 429 and 5xx
    pub fn is_transport(&self) -> bool {
        match self {
            ApiError::RequestError(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ApiError::Timeout(_) | ApiError::ServiceUnavailable | ApiError::RateLimited => true,
            _ => false,
        }
    }
}

/// Matches the error code against `codes`, either exactly or by the prefix
/// before the first `.` (so `InternalError` covers `InternalError.Unknown`)
pub fn is_expected(err: &ApiError, codes: &[&str]) -> bool {
    let Some(code) = err.code() else {
        return false;
    };
    let prefix = code.split('.').next().unwrap_or(code);
    codes.iter().any(|c| *c == code || *c == prefix)
}

/// Whether the error says the resource does not exist
pub fn is_not_found(err: &ApiError) -> bool {
    let Some(code) = err.code() else {
        return false;
    };
    code == "ResourceNotFound"
        || code == "VPCNotFound"
        || code == "InvalidVpcId.NotFound"
        || code.ends_with(".NotFound")
        || (code.starts_with("InvalidParameterValue.") && code.ends_with("NotFound"))
        || code.starts_with("ResourceNotFound.")
}
