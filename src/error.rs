use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Mined but reverted.
    #[error("Transaction {tx_hash} reverted (block {})", fmt_block(.block_number))]
    Transaction {
        tx_hash: String,
        block_number: Option<u64>,
    },

    #[error("Score API error: {0}")]
    ExternalApi(String),

    #[error("Match {0} not found in store")]
    NotFound(i64),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

fn fmt_block(block_number: &Option<u64>) -> String {
    block_number.map_or_else(|| "unknown".to_string(), |b| b.to_string())
}

/// Coarse error class recorded against a match in the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Rpc,
    Transaction,
    ExternalApi,
    NotFound,
    Persistence,
    Config,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Rpc(_) => ErrorKind::Rpc,
            AppError::Transaction { .. } => ErrorKind::Transaction,
            AppError::ExternalApi(_) | AppError::Http(_) | AppError::Json(_) => {
                ErrorKind::ExternalApi
            }
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Database(_) | AppError::Migration(_) | AppError::Io(_) => {
                ErrorKind::Persistence
            }
            AppError::Config(_) => ErrorKind::Config,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Rpc => "rpc",
            ErrorKind::Transaction => "transaction",
            ErrorKind::ExternalApi => "external_api",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Config => "config",
        };
        write!(f, "{s}")
    }
}
