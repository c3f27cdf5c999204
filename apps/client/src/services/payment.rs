use tracing::{info, warn};

use crate::api_client::ApiClient;
use crate::errors::ClientError;
use crate::models::payment::{
    CreateOrderRequest, PaymentHistoryResponse, PaymentOrder, PaymentRecord, PaymentStatus,
    VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::services::require;

/// POST /payment/create-order
pub async fn create_order(client: &ApiClient, plan: &str) -> Result<PaymentOrder, ClientError> {
    require("Plan", plan)?;
    let order: PaymentOrder = client
        .post_json("/payment/create-order", &CreateOrderRequest { plan })
        .await?;
    info!("Created order {} for plan {}", order.order_id, plan);
    Ok(order)
}

/// POST /payment/verify: the signature check itself happens server-side.
pub async fn verify_payment(
    client: &ApiClient,
    request: &VerifyPaymentRequest,
) -> Result<VerifyPaymentResponse, ClientError> {
    require("Order id", &request.razorpay_order_id)?;
    require("Payment id", &request.razorpay_payment_id)?;
    require("Signature", &request.razorpay_signature)?;
    let response: VerifyPaymentResponse = client.post_json("/payment/verify", request).await?;
    if !response.success {
        warn!("Payment {} was not verified", request.razorpay_payment_id);
    }
    Ok(response)
}

/// GET /payment/status
pub async fn payment_status(client: &ApiClient) -> Result<PaymentStatus, ClientError> {
    client.get_json("/payment/status").await
}

/// GET /payment/history
pub async fn payment_history(client: &ApiClient) -> Result<Vec<PaymentRecord>, ClientError> {
    let response: PaymentHistoryResponse = client.get_json("/payment/history").await?;
    Ok(response.payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::spawn_server;
    use axum::{routing::get, Json, Router};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_status_parses_expiry() {
        let router = Router::new().route(
            "/payment/status",
            get(|| async {
                Json(json!({"hasValidPayment": true, "expiryDate": "2030-01-01T00:00:00Z"}))
            }),
        );
        let base = spawn_server(router).await;
        let client =
            ApiClient::new(base, Duration::from_secs(5), Arc::new(MemoryStorage::new())).unwrap();

        let status = payment_status(&client).await.unwrap();
        assert!(status.has_valid_payment);
        assert_eq!(
            status.expiry_date,
            Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_verify_requires_signature() {
        let client = ApiClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
            Arc::new(MemoryStorage::new()),
        )
        .unwrap();
        let err = verify_payment(
            &client,
            &VerifyPaymentRequest {
                razorpay_order_id: "order_1".to_string(),
                razorpay_payment_id: "pay_1".to_string(),
                razorpay_signature: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.message(), "Signature is required");
    }
}
