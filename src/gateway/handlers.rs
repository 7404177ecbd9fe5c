use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::CacheKeystore;
use crate::domain::{self, EntityTable, OpType, QueuedWrite};
use crate::errors::GatewayError;
use crate::ledger;
use crate::queue::DurableQueue;

use super::admission::{Admission, AdmissionError};

pub struct GatewayState {
    pub pool: PgPool,
    #[allow(dead_code)]
    pub cache: CacheKeystore,
    pub admission: Admission,
    pub queue: DurableQueue,
}

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// The body each table's endpoint accepts. `operation_id` and `table` both
/// live outside this struct already (the header and the path segment);
/// `op_type` rides alongside `data` because a single `POST /<table>` route
/// covers all three mutation kinds and the processor's dispatch needs to
/// know which one before it can pick a schema to decode `data` against.
#[derive(Debug, serde::Deserialize)]
struct WriteRequestBody {
    op_type: OpType,
    data: serde_json::Value,
}

/// `POST /<table>`. Validates the payload against that table's schema for
/// the given `op_type`, admits the publish attempt past the circuit
/// breaker and in-flight cap, and publishes one message to DQ keyed by the
/// caller's `Idempotency-Key`.
#[tracing::instrument(name = "submit write", skip(body, state), fields(table = %*path))]
pub async fn submit_write(
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<GatewayState>,
) -> Result<HttpResponse, GatewayError> {
    let table: EntityTable = path
        .into_inner()
        .parse()
        .map_err(|_| GatewayError::InvalidRequest("unsupported table".to_string()))?;

    let operation_id = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(GatewayError::MissingIdempotencyKey)?;

    let request: WriteRequestBody =
        serde_json::from_slice(&body).map_err(|error| GatewayError::InvalidRequest(error.to_string()))?;

    validate_payload(table, request.op_type, &request.data)?;

    let queued = QueuedWrite {
        operation_id,
        table,
        op_type: request.op_type,
        data: request.data,
    };
    let payload =
        serde_json::to_vec(&queued).map_err(|error| GatewayError::UnexpectedError(error.into()))?;

    let guard = state.admission.try_admit().map_err(|error| match error {
        AdmissionError::Backpressure => GatewayError::Backpressure {
            retry_after_ms: state.admission.retry_after_ms(),
        },
        AdmissionError::CircuitOpen => GatewayError::CircuitOpen {
            retry_after_ms: state.admission.retry_after_ms(),
        },
    })?;

    match state.queue.publish_write(table, operation_id, payload.into()).await {
        Ok(()) => guard.succeeded(),
        Err(error) => {
            guard.failed();
            return Err(GatewayError::Upstream(anyhow::anyhow!(error)));
        }
    }

    Ok(HttpResponse::Accepted().json(json!({
        "status": "accepted",
        "operation_id": operation_id,
        "accepted_at": Utc::now(),
    })))
}

fn validate_payload(table: EntityTable, op_type: OpType, data: &serde_json::Value) -> Result<(), GatewayError> {
    let bad = GatewayError::InvalidRequest;
    match (table, op_type) {
        (EntityTable::Users, OpType::Create) => {
            let input: domain::users::CreateUserInput =
                serde_json::from_value(data.clone()).map_err(|e| bad(e.to_string()))?;
            input.validate().map_err(|e| bad(e.to_string()))
        }
        (EntityTable::Users, OpType::Update) => {
            serde_json::from_value::<domain::users::UpdateUserInput>(data.clone())
                .map(|_| ())
                .map_err(|e| bad(e.to_string()))
        }
        (EntityTable::Users, OpType::Delete) => {
            serde_json::from_value::<domain::users::DeleteUserInput>(data.clone())
                .map(|_| ())
                .map_err(|e| bad(e.to_string()))
        }
        (EntityTable::Orders, OpType::Create) => {
            let input: domain::orders::CreateOrderInput =
                serde_json::from_value(data.clone()).map_err(|e| bad(e.to_string()))?;
            input.validate().map_err(|e| bad(e.to_string()))
        }
        (EntityTable::Orders, OpType::Update) => {
            serde_json::from_value::<domain::orders::UpdateOrderInput>(data.clone())
                .map(|_| ())
                .map_err(|e| bad(e.to_string()))
        }
        (EntityTable::Orders, OpType::Delete) => {
            serde_json::from_value::<domain::orders::DeleteOrderInput>(data.clone())
                .map(|_| ())
                .map_err(|e| bad(e.to_string()))
        }
    }
}

/// `GET /status/<operation_id>`. A missing ledger row means the message may
/// still be sitting in DQ, not that the operation doesn't exist — per
/// spec this reads as `pending`, not `404`.
pub async fn read_status(path: web::Path<Uuid>, state: web::Data<GatewayState>) -> Result<HttpResponse, GatewayError> {
    let operation_id = path.into_inner();
    let row = ledger::fetch(&state.pool, operation_id)
        .await
        .map_err(|error| GatewayError::UnexpectedError(error.into()))?;

    match row {
        Some(row) => Ok(HttpResponse::Ok().json(json!({
            "status": row.status,
            "operation_id": row.operation_id,
            "table": row.entity_table,
            "entity_id": row.entity_id,
            "error": row.error,
        }))),
        None => Ok(HttpResponse::Ok().json(json!({
            "status": "pending",
            "operation_id": operation_id,
        }))),
    }
}

/// `GET /health`. Liveness plus the admission snapshot spec.md §7 asks for:
/// in-flight count, circuit state, consecutive failures.
pub async fn health(state: web::Data<GatewayState>) -> HttpResponse {
    let (in_flight, circuit_state, consecutive_failures) = state.admission.snapshot();
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "admission": {
            "in_flight": in_flight,
            "circuit_state": circuit_state,
            "consecutive_failures": consecutive_failures,
        },
    }))
}
