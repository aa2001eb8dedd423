//! Polling of asynchronous cloud operations

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

use super::client::Client;
use super::error::ApiError;
use super::retry::{retry_error, RetryError};

/// Result of one poll inside [`wait_for_state`]
#[derive(Debug)]
pub enum PollState<T> {
    Pending,
    Done(T),
    Failed(ApiError),
}

impl<T> PollState<T> {
    /// Retryable errors keep polling, anything else fails the wait
    pub fn from_error(err: ApiError) -> Self {
        match retry_error(err, &[]) {
            RetryError::Retryable(_) => PollState::Pending,
            RetryError::NonRetryable(e) => PollState::Failed(e),
        }
    }
}

/// Polls every `interval` until `poll` settles or `timeout` elapses
pub async fn wait_for_state<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut poll: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollState<T>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match poll().await {
            PollState::Done(value) => return Ok(value),
            PollState::Failed(e) => return Err(e),
            PollState::Pending => {
                if Instant::now() + interval > deadline {
                    return Err(ApiError::Timeout(timeout.as_secs()));
                }
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpcTaskResultRequest<'a> {
    task_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcTaskResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub request_id: String,
}

pub struct TaskApi<'a> {
    client: &'a Client,
}

impl<'a> TaskApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn describe(&self, task_id: &str) -> Result<VpcTaskResult, ApiError> {
        self.client
            .call(
                "DescribeVpcTaskResult",
                &DescribeVpcTaskResultRequest { task_id },
            )
            .await
    }
}

/// Waits for a VPC task, identified by the request id of the call that
/// started it, to reach `SUCCESS`
pub async fn wait_vpc_task(client: &Client, task_id: &str) -> Result<(), ApiError> {
    wait_for_state(client.write_timeout(), client.poll_interval(), move || async move {
        match client.tasks().describe(task_id).await {
            Ok(result) => match result.status.as_str() {
                "SUCCESS" => PollState::Done(()),
                "FAILED" => PollState::Failed(ApiError::TaskFailed {
                    task_id: task_id.to_string(),
                    output: result.output,
                }),
                status => {
                    tracing::debug!(task_id, status, "vpc task still running");
                    PollState::Pending
                }
            },
            Err(e) => PollState::from_error(e),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::ClientConfig;
    use mockito::{Matcher, Server};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client(url: &str) -> Client {
        let mut config = ClientConfig::new("id", "key", "ap-guangzhou");
        config.endpoint = Some(url.to_string());
        config.poll_interval = Duration::from_millis(10);
        config.write_timeout = Duration::from_secs(2);
        Client::new(config).unwrap()
    }

    #[tokio::test]
    async fn wait_for_state_returns_value() {
        let counter = AtomicU32::new(0);
        let polls = &counter;
        let value = wait_for_state(
            Duration::from_secs(1),
            Duration::from_millis(5),
            move || async move {
                if polls.fetch_add(1, Ordering::SeqCst) < 3 {
                    PollState::Pending
                } else {
                    PollState::Done(42)
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn wait_for_state_times_out() {
        let result: Result<(), _> = wait_for_state(
            Duration::from_millis(50),
            Duration::from_millis(20),
            || async { PollState::Pending },
        )
        .await;

        assert!(matches!(result, Err(ApiError::Timeout(_))));
    }

    #[tokio::test]
    async fn vpc_task_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeVpcTaskResult")
            .match_body(Matcher::Json(serde_json::json!({"TaskId": "req-task"})))
            .with_body(r#"{"Response":{"Status":"SUCCESS","Output":"","RequestId":"r1"}}"#)
            .create_async()
            .await;

        wait_vpc_task(&client(&server.url()), "req-task").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn vpc_task_failure_reports_output() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeVpcTaskResult")
            .with_body(
                r#"{"Response":{"Status":"FAILED","Output":"eip in use","RequestId":"r1"}}"#,
            )
            .create_async()
            .await;

        let err = wait_vpc_task(&client(&server.url()), "req-task")
            .await
            .unwrap_err();
        match err {
            ApiError::TaskFailed { task_id, output } => {
                assert_eq!(task_id, "req-task");
                assert_eq!(output, "eip in use");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
