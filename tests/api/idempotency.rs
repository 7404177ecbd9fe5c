use uuid::Uuid;

use crate::helpers::spawn_app;

#[tokio::test]
async fn duplicate_submit_produces_one_completed_row() {
    let app = spawn_app().await;
    let operation_id = Uuid::new_v4();
    let body = serde_json::json!({ "name": "Eve", "email": "eve@example.com" });

    let first = app.submit_write("users", operation_id, "create", body.clone()).await;
    assert_eq!(first.status().as_u16(), 202);
    let first_status = app.poll_until_terminal(operation_id, 50).await;
    assert_eq!(first_status["status"], "completed");

    let second = app.submit_write("users", operation_id, "create", body).await;
    assert_eq!(second.status().as_u16(), 202);

    // Give the duplicate delivery time to reach the processor and be
    // absorbed at the idempotency pivot.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let users_count = sqlx::query!("SELECT COUNT(*) as count FROM users")
        .fetch_one(&app.db_pool)
        .await
        .expect("query users")
        .count
        .unwrap();
    assert_eq!(users_count, 1);

    let ops_count = sqlx::query!(
        "SELECT COUNT(*) as count FROM write_operations WHERE operation_id = $1",
        operation_id
    )
    .fetch_one(&app.db_pool)
    .await
    .expect("query write_operations")
    .count
    .unwrap();
    assert_eq!(ops_count, 1);
}
