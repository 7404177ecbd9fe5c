use actix_cors::Cors;
use actix_web::dev::ServerHandle;
use actix_web::{dev::Server, http, web, web::Data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::cache::CacheKeystore;
use crate::configuration::{CorsSettings, DatabaseSettings, Settings};
use crate::gateway::{self, Admission, GatewayState};
use crate::queue::DurableQueue;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    #[allow(clippy::missing_errors_doc)]
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);

        let queue = DurableQueue::connect(configuration.dq.clone()).await?;
        queue.ensure_streams().await?;
        let cache = CacheKeystore::connect(&configuration.cache.redis_uri).await?;
        let admission = Admission::new(&configuration.admission);

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port,
        );

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr().unwrap().port();
        let server = run(
            listener,
            connection_pool,
            queue,
            cache,
            admission,
            configuration.cors,
        )?;

        Ok(Self { port, server })
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[allow(clippy::missing_errors_doc)]
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }

    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        self.server.handle()
    }
}

fn run(
    listener: TcpListener,
    db_pool: PgPool,
    queue: DurableQueue,
    cache: CacheKeystore,
    admission: Admission,
    cors_config: CorsSettings,
) -> Result<Server, anyhow::Error> {
    let state = Data::new(GatewayState {
        pool: db_pool,
        cache,
        admission,
        queue,
    });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .service(
                web::scope("/api")
                    .wrap({
                        let mut cors = Cors::default();
                        for origin in &cors_config.allowed_origins {
                            cors = cors.allowed_origin(origin);
                        }
                        cors.allowed_methods(vec!["GET", "POST"])
                            .allowed_headers(vec![
                                http::header::CONTENT_TYPE,
                                http::header::HeaderName::from_static("idempotency-key"),
                            ])
                            .max_age(cors_config.max_age)
                    })
                    .configure(gateway::configure),
            )
            .app_data(state.clone())
    })
    .disable_signals()
    .listen(listener)?
    .run();

    Ok(server)
}

#[must_use]
pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(configuration.connect_options())
}
