/// Whether a failed write should be retried or recorded as a terminal
/// ledger failure. Built as an explicit safelist over Postgres SQLSTATE
/// codes rather than a blocklist over error text: substring matching on
/// error messages is forbidden by design. A `sqlx::Error` that never
/// reached the database at all — a dropped connection, a timed-out pool
/// checkout — is retryable too, same as the SQLSTATEs below it; anything
/// else not on the safelist fails fast as non-retryable instead of
/// retrying blind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

const RETRYABLE_SQLSTATES: &[&str] = &[
    "08000", // connection_exception
    "08001", // sqlclient_unable_to_establish_sqlconnection
    "08003", // connection_does_not_exist
    "08004", // sqlserver_rejected_establishment_of_sqlconnection
    "08006", // connection_failure
    "57P01", // admin_shutdown
    "57P02", // crash_shutdown
    "57P03", // cannot_connect_now
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "53300", // too_many_connections
];

#[must_use]
pub fn classify(error: &sqlx::Error) -> ErrorClass {
    if matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Protocol(_)
    ) {
        return ErrorClass::Retryable;
    }

    match error.as_database_error() {
        Some(db_err) => match db_err.code() {
            Some(code) if RETRYABLE_SQLSTATES.contains(&code.as_ref()) => ErrorClass::Retryable,
            _ => ErrorClass::NonRetryable,
        },
        None => ErrorClass::NonRetryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_is_retryable() {
        // A connection drop or pool timeout never reached the database at
        // all, but it's exactly the kind of transient condition a retry
        // resolves.
        let error = sqlx::Error::PoolTimedOut;
        assert_eq!(classify(&error), ErrorClass::Retryable);
    }

    #[test]
    fn non_database_non_transport_error_fails_fast() {
        let error = sqlx::Error::RowNotFound;
        assert_eq!(classify(&error), ErrorClass::NonRetryable);
    }
}
