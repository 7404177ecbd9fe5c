use std::fmt::{Debug, Display};
use tokio::task::JoinError;

use tokio_util::sync::CancellationToken;

use write_pipeline::{
    cache::CacheKeystore,
    configuration::get_configuration,
    domain::EntityTable,
    ledger,
    processor::run_table_handler,
    queue::DurableQueue,
    shutdown::wait_for_signal,
    startup::get_connection_pool,
    telemetry::{get_subscriber, init_subscriber},
};

const TABLES: [EntityTable; 2] = [EntityTable::Users, EntityTable::Orders];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("TOKIO_CONSOLE").is_ok() {
        console_subscriber::init();
    } else {
        let subscriber = get_subscriber("write_processor".into(), "info".into(), std::io::stdout);
        init_subscriber(subscriber);
    }

    let configuration = get_configuration().expect("Failed to read configuration.");
    let pool = get_connection_pool(&configuration.database);
    let queue = DurableQueue::connect(configuration.dq.clone()).await?;
    queue.ensure_streams().await?;
    let cache = CacheKeystore::connect(&configuration.cache.redis_uri).await?;
    let shutdown = CancellationToken::new();

    let mut handler_tasks = Vec::new();
    for table in TABLES {
        let task = tokio::spawn(run_table_handler(
            queue.clone(),
            pool.clone(),
            cache.clone(),
            table,
            shutdown.clone(),
        ));
        handler_tasks.push((table.to_string(), task));
    }

    let sweeper_task = tokio::spawn(ledger::run_sweeper(pool.clone(), configuration.sweeper));

    let mut handler_futures: futures_util::stream::FuturesUnordered<_> = handler_tasks
        .into_iter()
        .map(|(name, task)| async move { (name, task.await) })
        .collect();

    tokio::select! {
        Some((name, outcome)) = futures_util::StreamExt::next(&mut handler_futures) => {
            report_exit(&name, outcome);
        }
        o = sweeper_task => {
            if let Err(error) = o {
                tracing::error!(?error, "ledger sweeper task failed to complete");
            }
        }
        () = wait_for_signal() => {
            tracing::info!("shutdown signal received, draining table handlers");
            shutdown.cancel();
            while let Some((name, outcome)) = futures_util::StreamExt::next(&mut handler_futures).await {
                report_exit(&name, outcome);
            }
        }
    }

    Ok(())
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                task_name
            )
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{}' task failed to complete",
                task_name
            )
        }
    }
}
