//! # Gateway クライアント
//!
//! Gateway の HTTP API を呼び出す。失敗レスポンスも [`ErrorResponse`] として解釈する。

use std::time::Duration;

use tokenforge_types::{
    CreateTokenRequest, CreateTokenResponse, ErrorResponse, IssuerInfo, PingResponse,
};

/// Gateway 呼び出しのエラー型
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// 通信失敗
    #[error("Gatewayへの接続に失敗: {0}")]
    Http(#[from] reqwest::Error),
    /// Gateway が失敗レスポンスを返した
    #[error("Gatewayがエラーを返しました (HTTP {status}): {}", .body.message)]
    Api {
        /// HTTPステータスコード
        status: u16,
        /// 失敗レスポンス
        body: ErrorResponse,
    },
}

/// Gateway API クライアント。
pub struct GatewayClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// クライアントを作成する。
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /api/ping`
    pub async fn ping(&self) -> Result<PingResponse, ClientError> {
        let response = self
            .http_client
            .get(format!("{}/api/ping", self.base_url))
            .send()
            .await?;
        parse(response).await
    }

    /// `GET /api/stellar/issuer`
    pub async fn issuer(&self) -> Result<IssuerInfo, ClientError> {
        let response = self
            .http_client
            .get(format!("{}/api/stellar/issuer", self.base_url))
            .send()
            .await?;
        parse(response).await
    }

    /// `POST /api/stellar/create-token`
    pub async fn create_token(
        &self,
        request: &CreateTokenRequest,
    ) -> Result<CreateTokenResponse, ClientError> {
        let response = self
            .http_client
            .post(format!("{}/api/stellar/create-token", self.base_url))
            .json(request)
            .send()
            .await?;
        parse(response).await
    }
}

/// 成功時は `T`、失敗時は [`ErrorResponse`] としてパースする。
async fn parse<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let status = status.as_u16();
    let body = match response.json::<ErrorResponse>().await {
        Ok(body) => body,
        Err(e) => ErrorResponse::new("Unexpected response", e.to_string()),
    };
    Err(ClientError::Api { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::Json;

    async fn spawn_gateway(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn test_create_token_success() {
        let router = axum::Router::new().route(
            "/api/stellar/create-token",
            axum::routing::post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["tokenCode"], "USD");
                assert_eq!(body["destinationAccount"], "GDEST");
                Json(serde_json::json!({
                    "success": true,
                    "message": "Successfully issued 50 USD to GDEST",
                    "transactionHash": "abcd",
                    "tokenDetails": {
                        "code": "USD",
                        "issuer": "GISSUER",
                        "asset": "USD:GISSUER",
                        "amount_issued": "50",
                        "distributed_to": "GDEST"
                    }
                }))
            }),
        );
        let base = spawn_gateway(router).await;
        let client = GatewayClient::new(&base, Duration::from_secs(5)).unwrap();

        let response = client
            .create_token(&CreateTokenRequest {
                token_code: Some("USD".to_string()),
                amount: None,
                destination_account: Some("GDEST".to_string()),
                destination_secret: None,
            })
            .await
            .unwrap();
        assert_eq!(response.transaction_hash.as_deref(), Some("abcd"));
        assert_eq!(response.token_details.amount_issued.as_deref(), Some("50"));
    }

    #[tokio::test]
    async fn test_failure_body_is_parsed() {
        let router = axum::Router::new().route(
            "/api/stellar/create-token",
            axum::routing::post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "success": false,
                        "error": "Failed to create token on Stellar",
                        "message": "transaction rejected by the network: tx_bad_auth",
                        "details": {"transaction": "tx_bad_auth"}
                    })),
                )
            }),
        );
        let base = spawn_gateway(router).await;
        let client = GatewayClient::new(&base, Duration::from_secs(5)).unwrap();

        match client.create_token(&CreateTokenRequest::default()).await {
            Err(ClientError::Api { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body.details.unwrap().transaction, "tx_bad_auth");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let router = axum::Router::new().route(
            "/api/ping",
            axum::routing::get(|| async { Json(serde_json::json!({"message": "pong"})) }),
        );
        let base = spawn_gateway(router).await;
        let client = GatewayClient::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();
        assert_eq!(client.ping().await.unwrap().message, "pong");
    }
}
