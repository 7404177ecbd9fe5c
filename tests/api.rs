mod helpers;

mod health_check;
mod idempotency;
mod orders;
mod status;
mod users;
