use std::fmt::{Debug, Display};
use tokio::task::JoinError;

use write_pipeline::{
    configuration::get_configuration,
    shutdown::wait_for_signal,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("TOKIO_CONSOLE").is_ok() {
        console_subscriber::init();
    } else {
        let subscriber = get_subscriber("gateway".into(), "info".into(), std::io::stdout);
        init_subscriber(subscriber);
    }

    let configuration = get_configuration().expect("Failed to read configuration.");
    let application = Application::build(configuration).await?;
    let handle = application.handle();
    let mut application_task = tokio::spawn(application.run_until_stopped());

    tokio::select! {
        o = &mut application_task => report_exit("gateway", o),
        () = wait_for_signal() => {
            tracing::info!("shutdown signal received, draining in-flight requests");
            handle.stop(true).await;
            report_exit("gateway", application_task.await);
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
