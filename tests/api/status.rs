use uuid::Uuid;

use crate::helpers::spawn_app;

#[tokio::test]
async fn unknown_operation_reads_as_pending() {
    let app = spawn_app().await;

    let response = app.status(Uuid::new_v4()).await;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("status body");
    assert_eq!(body["status"], "pending");
}
