use uuid::Uuid;

use crate::helpers::spawn_app;

#[tokio::test]
async fn order_for_nonexistent_user_fails_without_retry() {
    let app = spawn_app().await;
    let operation_id = Uuid::new_v4();

    let response = app
        .submit_write(
            "orders",
            operation_id,
            "create",
            serde_json::json!({
                "user_id": Uuid::new_v4(),
                "amount_cents": 500,
                "description": "a widget",
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 202);

    let status = app.poll_until_terminal(operation_id, 50).await;
    assert_eq!(status["status"], "failed");
    assert!(status["error"].as_str().is_some());

    let row = sqlx::query!("SELECT COUNT(*) as count FROM orders")
        .fetch_one(&app.db_pool)
        .await
        .expect("query orders");
    assert_eq!(row.count, Some(0));
}

#[tokio::test]
async fn order_create_then_update_applies_in_order() {
    let app = spawn_app().await;
    let user_op = Uuid::new_v4();
    app.submit_write(
        "users",
        user_op,
        "create",
        serde_json::json!({ "name": "Dana", "email": "dana@example.com" }),
    )
    .await;
    let user_status = app.poll_until_terminal(user_op, 50).await;
    assert_eq!(user_status["status"], "completed");
    let user_id = user_status["entity_id"].as_str().unwrap().to_string();

    let order_op = Uuid::new_v4();
    app.submit_write(
        "orders",
        order_op,
        "create",
        serde_json::json!({ "user_id": user_id, "amount_cents": 1000, "description": "widget" }),
    )
    .await;
    let order_status = app.poll_until_terminal(order_op, 50).await;
    assert_eq!(order_status["status"], "completed");
    let order_id = order_status["entity_id"].as_str().unwrap().to_string();

    let update_op = Uuid::new_v4();
    app.submit_write(
        "orders",
        update_op,
        "update",
        serde_json::json!({ "order_id": order_id, "amount_cents": 2000 }),
    )
    .await;
    let update_status = app.poll_until_terminal(update_op, 50).await;
    assert_eq!(update_status["status"], "completed");

    let row = sqlx::query!("SELECT amount_cents FROM orders WHERE order_id = $1::uuid", order_id)
        .fetch_one(&app.db_pool)
        .await
        .expect("query orders");
    assert_eq!(row.amount_cents, 2000);
}
