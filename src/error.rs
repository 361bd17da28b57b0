use thiserror::Error;

use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Error)]
pub enum SniperError {
    #[error("RPC transport error: {0}")]
    TransientRpc(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Blockhash expired: {0}")]
    StaleBlockhash(String),

    #[error("Account constraint violated: {0}")]
    ProtocolConstraint(String),

    #[error("Program rejected instruction: {0}")]
    InstructionExecution(String),

    #[error("Bonding curve account not found for mint {0}")]
    PoolNotFound(Pubkey),

    #[error("Failed to resolve pool state: {0}")]
    PoolResolutionFailed(String),

    #[error("Transaction simulation failed: {0}")]
    SimulationFailed(String),

    #[error("No tokens received after {attempts} balance checks")]
    NoTokensReceived { attempts: u32 },

    #[error("Bundle submission failed: {0}")]
    RelaySubmissionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Log subscription error: {0}")]
    Subscription(String),
}

/// Coarse failure category, used to pick the right log line for an error
/// whose concrete source is a string (RPC client errors, simulation logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    TransientRpc,
    InsufficientBalance,
    StaleBlockhash,
    ProtocolConstraint,
    InstructionExecution,
    Other,
}

/// Categorize an error message by its text. Rate-limit and server errors
/// (429/503) are transient; seed-constraint and instruction errors indicate
/// a builder or account-layout bug rather than a network condition.
pub fn classify(message: &str) -> ErrorCategory {
    if message.contains("429") || message.contains("503") {
        ErrorCategory::TransientRpc
    } else if message.contains("Insufficient") {
        ErrorCategory::InsufficientBalance
    } else if message.contains("Blockhash") || message.contains("blockhash") {
        ErrorCategory::StaleBlockhash
    } else if message.contains("ConstraintSeeds") {
        ErrorCategory::ProtocolConstraint
    } else if message.contains("InstructionError") {
        ErrorCategory::InstructionExecution
    } else {
        ErrorCategory::Other
    }
}

/// Log a failure with its category. Every failure surfaced to a lifecycle
/// goes through here at least once; nothing is swallowed silently.
pub fn log_classified(context: &str, err: &dyn std::fmt::Display) {
    let message = err.to_string();
    match classify(&message) {
        ErrorCategory::TransientRpc => {
            tracing::error!("{}: RPC connection failed, likely rate limit or server error: {}", context, message)
        }
        ErrorCategory::InsufficientBalance => {
            tracing::error!("{}: insufficient balance: {}", context, message)
        }
        ErrorCategory::StaleBlockhash => {
            tracing::error!("{}: transaction failed due to expired blockhash: {}", context, message)
        }
        ErrorCategory::ProtocolConstraint => {
            tracing::error!("{}: seed constraint error, likely incorrect account configuration: {}", context, message)
        }
        ErrorCategory::InstructionExecution => {
            tracing::error!("{}: instruction error, possible invalid instruction data or accounts: {}", context, message)
        }
        ErrorCategory::Other => tracing::error!("{}: {}", context, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transient() {
        assert_eq!(classify("HTTP status 429 Too Many Requests"), ErrorCategory::TransientRpc);
        assert_eq!(classify("server returned 503"), ErrorCategory::TransientRpc);
    }

    #[test]
    fn test_classify_balance_and_blockhash() {
        assert_eq!(
            classify("Insufficient SOL balance: 0.01 SOL < 0.05 SOL"),
            ErrorCategory::InsufficientBalance
        );
        assert_eq!(classify("Blockhash not found"), ErrorCategory::StaleBlockhash);
    }

    #[test]
    fn test_classify_program_errors() {
        assert_eq!(
            classify("Error Code: ConstraintSeeds. Error Number: 2006"),
            ErrorCategory::ProtocolConstraint
        );
        assert_eq!(
            classify("InstructionError(3, Custom(6002))"),
            ErrorCategory::InstructionExecution
        );
        assert_eq!(classify("something else entirely"), ErrorCategory::Other);
    }
}
