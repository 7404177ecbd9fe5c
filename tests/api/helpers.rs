use secrecy::SecretString;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::sync::LazyLock;
use uuid::Uuid;

use write_pipeline::cache::CacheKeystore;
use write_pipeline::configuration::{get_configuration, DatabaseSettings};
use write_pipeline::domain::EntityTable;
use write_pipeline::processor::run_table_handler;
use write_pipeline::queue::DurableQueue;
use write_pipeline::startup::{get_connection_pool, Application};
use write_pipeline::telemetry::{get_subscriber, init_subscriber};

static TRACING: LazyLock<()> = LazyLock::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn submit_write(
        &self,
        table: &str,
        operation_id: Uuid,
        op_type: &str,
        data: serde_json::Value,
    ) -> reqwest::Response {
        self.api_client
            .post(format!("{}/api/{table}", &self.address))
            .header("Idempotency-Key", operation_id.to_string())
            .json(&serde_json::json!({ "op_type": op_type, "data": data }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn status(&self, operation_id: Uuid) -> reqwest::Response {
        self.api_client
            .get(format!("{}/api/status/{operation_id}", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn health(&self) -> reqwest::Response {
        self.api_client
            .get(format!("{}/api/health", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Polls status until a terminal state is observed or `attempts` is
    /// exhausted, mirroring how a real client is expected to consume SR.
    pub async fn poll_until_terminal(&self, operation_id: Uuid, attempts: u32) -> serde_json::Value {
        for _ in 0..attempts {
            let body: serde_json::Value = self.status(operation_id).await.json().await.expect("status body");
            if body["status"] != "pending" {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        self.status(operation_id).await.json().await.expect("status body")
    }
}

pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        c.database.database_name = Uuid::new_v4().to_string();
        c.application.port = 0;
        // Every test run gets its own streams so concurrent test binaries
        // (and concurrent tests within one) never share a durable cursor.
        let suffix = Uuid::new_v4().simple().to_string();
        c.dq.writes_stream = format!("WRITES_{suffix}");
        c.dq.dlq_stream = format!("WRITES_DLQ_{suffix}");
        c.dq.cdc_stream = format!("DB_CDC_{suffix}");
        c
    };

    configure_database(&configuration.database).await;

    let application = Application::build(configuration.clone())
        .await
        .expect("Failed to build application.");
    let application_port = application.port();
    let _ = tokio::spawn(application.run_until_stopped());

    let pool = get_connection_pool(&configuration.database);
    let queue = DurableQueue::connect(configuration.dq.clone())
        .await
        .expect("Failed to connect to the durable queue.");
    let cache = CacheKeystore::connect(&configuration.cache.redis_uri)
        .await
        .expect("Failed to connect to the cache.");

    for table in [EntityTable::Users, EntityTable::Orders] {
        let _ = tokio::spawn(run_table_handler(
            queue.clone(),
            pool.clone(),
            cache.clone(),
            table,
            tokio_util::sync::CancellationToken::new(),
        ));
    }

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    TestApp {
        address: format!("http://localhost:{application_port}"),
        db_pool: pool,
        api_client: client,
    }
}

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let maintenance_settings = DatabaseSettings {
        database_name: "postgres".to_string(),
        username: "postgres".to_string(),
        password: SecretString::new("password".into()),
        ..config.clone()
    };

    let mut connection = PgConnection::connect_with(&maintenance_settings.connect_options())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.database_name).as_str())
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect_with(config.connect_options())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");

    connection_pool
}
