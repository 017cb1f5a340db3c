use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub use diesel::r2d2::PoolError;

pub type ConnectionPool = Pool<ConnectionManager<PgConnection>>;

/// Checkout timeout for pool connections. Pipeline jobs hold few
/// connections but keep them busy with long bulk statements, so a waiting
/// worker gets a generous window before giving up.
const POOL_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(60);

pub fn get_pool(max_size: u32) -> Result<ConnectionPool, PoolError> {
    let manager = ConnectionManager::new(postgres_url_from_environment());

    Pool::builder()
        .max_size(max_size)
        .connection_timeout(POOL_CHECKOUT_TIMEOUT)
        .build(manager)
}

pub fn postgres_url_from_environment() -> String {
    #[derive(Debug, PartialEq, Deserialize)]
    struct PostgresConfig {
        user: String,
        password: Option<String>,
        password_file: Option<PathBuf>,
        host: Option<String>,
        db: String,
    }
    let provider = figment::providers::Env::prefixed("POSTGRES_");
    let postgres_config: PostgresConfig = figment::Figment::from(provider)
        .extract()
        .expect("Postgres configuration environment variable(s) missing or invalid");

    let password = if let Some(password) = postgres_config.password {
        password
    } else if let Some(password_file) = postgres_config.password_file {
        std::fs::read_to_string(password_file).expect("Failed to read postgres password file")
    } else {
        panic!("One of POSTGRES_PASSWORD or POSTGRES_PASSWORD_FILE must be provided");
    };

    // A trailing newline is almost always an artifact of how the secret file
    // was written, so it is trimmed. A newline anywhere else would be
    // silently truncated by the postgres auth path, turning a strong
    // password into a weak one, so that is a hard error instead.
    let password = if let Some(pw) = password.strip_suffix("\n") {
        pw
    } else {
        &password
    };

    if password.contains("\n") {
        eprintln!(
            "Postgres password contains a non-terminal newline and would be insecurely \
            truncated. Use a password without interior newlines."
        );
        panic!(
            "Postgres password contains a non-terminal newline and would be insecurely \
            truncated. Use a password without interior newlines."
        );
    }

    let password = utf8_percent_encode(password, NON_ALPHANUMERIC);
    let host = postgres_config.host.as_deref().unwrap_or("localhost");

    format!(
        "postgres://{}:{}@{}/{}",
        postgres_config.user, password, host, postgres_config.db
    )
}
