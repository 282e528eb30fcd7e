use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use backon::{ExponentialBuilder, Retryable};
use tracing::warn;
use url::Url;

pub struct UpstreamApi;

impl UpstreamApi {
    /// Send one proxied exchange. Connect failures are retried for every
    /// method; timeouts and upstream 5xx are additionally retried for
    /// idempotent methods, where a replay cannot double-apply.
    pub async fn try_forward(
        client: reqwest::Client,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
        retry_policy: ExponentialBuilder,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let idempotent =
            method == Method::GET || method == Method::HEAD || method == Method::OPTIONS;

        (|| async {
            let resp = client
                .request(method.clone(), url.clone())
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await?;
            if idempotent && resp.status().is_server_error() {
                let status = resp.status();
                let err = resp.error_for_status().unwrap_err();
                warn!(%status, "upstream server error (will retry)");
                return Err(err);
            }
            Ok(resp)
        })
        .retry(retry_policy)
        .when(move |e: &reqwest::Error| {
            e.is_connect() || (idempotent && (e.is_timeout() || e.is_status()))
        })
        .await
    }
}
