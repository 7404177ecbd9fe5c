use tokio_util::sync::CancellationToken;

use write_pipeline::{
    cache::CacheKeystore,
    cdc,
    configuration::get_configuration,
    queue::DurableQueue,
    shutdown::wait_for_signal,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("TOKIO_CONSOLE").is_ok() {
        console_subscriber::init();
    } else {
        let subscriber = get_subscriber("cdc_consumer".into(), "info".into(), std::io::stdout);
        init_subscriber(subscriber);
    }

    let configuration = get_configuration().expect("Failed to read configuration.");
    let queue = DurableQueue::connect(configuration.dq.clone()).await?;
    queue.ensure_streams().await?;
    let cache = CacheKeystore::connect(&configuration.cache.redis_uri).await?;
    let shutdown = CancellationToken::new();

    let mut run_task = tokio::spawn(cdc::run(queue, cache, shutdown.clone()));

    let outcome = tokio::select! {
        o = &mut run_task => o,
        () = wait_for_signal() => {
            tracing::info!("shutdown signal received, draining CDC consumer");
            shutdown.cancel();
            run_task.await
        }
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => {
            tracing::error!(?error, "cdc consumer exited with an error");
            Err(error)
        }
        Err(join_error) => {
            tracing::error!(?join_error, "cdc consumer task failed to complete");
            Err(join_error.into())
        }
    }
}
