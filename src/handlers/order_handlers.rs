use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use crate::api::order_sink::OrderSink;
use crate::config::app_config::DispatchMode;
use crate::models::order_models::{as_number, as_text, OrderRecord, OrderSubmission};
use crate::AppState;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    MalformedBody(#[from] serde_json::Error),
    #[error("order body must be a JSON object")]
    NotAnObject,
    #[error("total price {submitted} does not match {quantity} x {unit_price}")]
    PriceMismatch {
        submitted: f64,
        quantity: f64,
        unit_price: f64,
    },
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = match self {
            OrderError::MalformedBody(_) | OrderError::NotAnObject => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            OrderError::PriceMismatch { .. } => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(json!({
                "success": false,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkOutcome {
    Skipped,
    Delivered,
    Failed,
}

/// What happened at each sink. Only logged, never sent to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub email: SinkOutcome,
    pub ledger: SinkOutcome,
}

/// Fans an order out to the email and ledger sinks, best effort.
#[derive(Clone, Default)]
pub struct OrderDispatcher {
    pub email: Option<Arc<dyn OrderSink>>,
    pub ledger: Option<Arc<dyn OrderSink>>,
    pub mode: DispatchMode,
}

impl OrderDispatcher {
    pub async fn dispatch(&self, order: &OrderRecord) -> DispatchReport {
        match self.mode {
            DispatchMode::Sequential => {
                let email = attempt("email", self.email.as_deref(), order).await;
                let ledger = attempt("ledger", self.ledger.as_deref(), order).await;
                DispatchReport { email, ledger }
            }
            DispatchMode::Concurrent => {
                let (email, ledger) = tokio::join!(
                    attempt("email", self.email.as_deref(), order),
                    attempt("ledger", self.ledger.as_deref(), order),
                );
                DispatchReport { email, ledger }
            }
        }
    }
}

async fn attempt(label: &str, sink: Option<&dyn OrderSink>, order: &OrderRecord) -> SinkOutcome {
    let Some(sink) = sink else {
        tracing::debug!("{} sink not configured, skipping", label);
        return SinkOutcome::Skipped;
    };
    match sink.deliver(order).await {
        Ok(()) => SinkOutcome::Delivered,
        Err(e) => {
            tracing::error!("{} sink failed: {}", label, e);
            SinkOutcome::Failed
        }
    }
}

/// Only numeric quantities and totals can be priced; anything else is
/// relayed unchecked.
fn check_price(submission: &OrderSubmission, unit_price: Option<f64>) -> Result<(), OrderError> {
    let Some(unit_price) = unit_price else {
        return Ok(());
    };
    let (Some(quantity), Some(submitted)) = (
        as_number(&submission.quantity),
        as_number(&submission.total_price),
    ) else {
        tracing::warn!("Order total or quantity is not numeric, skipping price check");
        return Ok(());
    };
    if (submitted - quantity * unit_price).abs() > 0.005 {
        return Err(OrderError::PriceMismatch {
            submitted,
            quantity,
            unit_price,
        });
    }
    Ok(())
}

/// POST /api/submit-order
///
/// Responds with success once every configured sink has been tried, whether
/// or not the attempts worked. Only a body that is not a JSON object (or a
/// rejected price when server pricing is on) is reported as a failure.
///
/// Sinks run on their own task so a client hanging up mid-request does not
/// cancel an email or sheet write already in flight.
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, OrderError> {
    let submission = parse_submission(&body).map_err(|e| {
        tracing::error!("Rejecting order with unreadable body: {}", e);
        e
    })?;

    check_price(&submission, state.config.unit_price).map_err(|e| {
        tracing::warn!("Rejecting order: {}", e);
        e
    })?;

    let order = OrderRecord::new(submission, Utc::now());
    let dispatch = tokio::spawn(async move {
        let report = state.dispatcher.dispatch(&order).await;
        tracing::info!(
            "Order from {} processed (email: {:?}, ledger: {:?})",
            as_text(&order.submission.name),
            report.email,
            report.ledger
        );
    });
    if let Err(e) = dispatch.await {
        tracing::error!("Order dispatch task failed: {}", e);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Order processed",
    })))
}

fn parse_submission(body: &[u8]) -> Result<OrderSubmission, OrderError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(OrderError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}
