// External token-filter boundary. List-based allow/deny filtering lives
// outside this crate; the pipeline only consumes a pass/fail verdict.

use anyhow::Result;
use async_trait::async_trait;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};

use crate::solana::SolanaClient;

#[derive(Debug, Clone)]
pub struct FilterVerdict {
    pub pass: bool,
    pub reason: String,
}

impl FilterVerdict {
    pub fn pass() -> Self {
        Self {
            pass: true,
            reason: String::new(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait TokenFilter: Send + Sync {
    async fn check(
        &self,
        mint: &Pubkey,
        client: &SolanaClient,
        commitment: CommitmentConfig,
    ) -> Result<FilterVerdict>;
}

/// Default filter: every token passes. Wired in when no external filter
/// implementation is configured.
pub struct AllowAllFilter;

#[async_trait]
impl TokenFilter for AllowAllFilter {
    async fn check(
        &self,
        _mint: &Pubkey,
        _client: &SolanaClient,
        _commitment: CommitmentConfig,
    ) -> Result<FilterVerdict> {
        Ok(FilterVerdict::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_constructors() {
        assert!(FilterVerdict::pass().pass);
        let failed = FilterVerdict::fail("mint authority not renounced");
        assert!(!failed.pass);
        assert_eq!(failed.reason, "mint authority not renounced");
    }
}
