use crate::helpers::spawn_app;

#[tokio::test]
async fn health_check_reports_admission_snapshot() {
    let app = spawn_app().await;

    let response = app.health().await;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("health body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["admission"]["in_flight"], 0);
    assert_eq!(body["admission"]["circuit_state"], "closed");
}
