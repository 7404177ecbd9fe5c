use uuid::Uuid;

use crate::helpers::spawn_app;

#[tokio::test]
async fn happy_path_create_user_reaches_completed() {
    let app = spawn_app().await;
    let operation_id = Uuid::new_v4();

    let response = app
        .submit_write(
            "users",
            operation_id,
            "create",
            serde_json::json!({ "name": "Alice", "email": "alice@example.com" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 202);
    let accepted: serde_json::Value = response.json().await.expect("accepted body");
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["operation_id"], operation_id.to_string());

    let status = app.poll_until_terminal(operation_id, 50).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["table"], "users");

    let row = sqlx::query!("SELECT COUNT(*) as count FROM users")
        .fetch_one(&app.db_pool)
        .await
        .expect("query users");
    assert_eq!(row.count, Some(1));
}

#[tokio::test]
async fn invalid_email_is_rejected_at_ingress() {
    let app = spawn_app().await;
    let operation_id = Uuid::new_v4();

    let response = app
        .submit_write(
            "users",
            operation_id,
            "create",
            serde_json::json!({ "name": "Bob", "email": "not-an-email" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);

    let row = sqlx::query!("SELECT COUNT(*) as count FROM write_operations")
        .fetch_one(&app.db_pool)
        .await
        .expect("query write_operations");
    assert_eq!(row.count, Some(0));
}

#[tokio::test]
async fn missing_idempotency_key_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .post(format!("{}/api/users", &app.address))
        .json(&serde_json::json!({ "op_type": "create", "data": { "name": "Carl", "email": "carl@example.com" } }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status().as_u16(), 400);
}
