/// Settlement tracking
///
/// Polls signature status until the configured commitment is reached. Runs
/// as a task owned by the orchestrator so it can be aborted with the attempt.
use crate::config::SettlementConfig;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::rpc::{NodeRpc, SignatureStatus};
use crate::utils::{short_address, with_timeout};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct SettlementTracker {
    rpc: Arc<dyn NodeRpc>,
    poll_interval: Duration,
    timeout: Duration,
    commitment: String,
}

impl SettlementTracker {
    pub fn new(
        rpc: Arc<dyn NodeRpc>,
        poll_interval: Duration,
        timeout: Duration,
        commitment: &str,
    ) -> Self {
        Self {
            rpc,
            poll_interval,
            timeout,
            commitment: commitment.to_string(),
        }
    }

    pub fn from_config(rpc: Arc<dyn NodeRpc>, config: &SettlementConfig) -> Self {
        Self::new(
            rpc,
            config.poll_interval(),
            config.timeout(),
            &config.commitment,
        )
    }

    /// Wait until `signature` reaches the commitment level
    ///
    /// An execution error fails with `SubmissionFailed`; running out of time
    /// fails with `UpstreamUnavailable`.
    pub async fn wait_for_confirmation(
        &self,
        signature: &str,
    ) -> Result<SignatureStatus, FlowError> {
        with_timeout(self.timeout, "Settlement", self.poll(signature)).await
    }

    /// Run `wait_for_confirmation` as an abortable task
    pub fn spawn(&self, signature: String) -> JoinHandle<Result<SignatureStatus, FlowError>> {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.wait_for_confirmation(&signature).await })
    }

    async fn poll(&self, signature: &str) -> Result<SignatureStatus, FlowError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut attempts: u32 = 0;

        loop {
            ticker.tick().await;
            attempts += 1;

            match self.rpc.get_signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = &status.err {
                        return Err(FlowError::submission_failed(format!(
                            "Transaction {} failed on-chain: {}",
                            short_address(signature),
                            err
                        )));
                    }
                    if status.satisfies(&self.commitment) {
                        logger::info(
                            LogTag::Settlement,
                            &format!(
                                "{} reached {} at slot {} after {} polls",
                                short_address(signature),
                                self.commitment,
                                status.slot,
                                attempts
                            ),
                        );
                        return Ok(status);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // Node hiccups are retried until the settlement deadline
                    logger::debug(
                        LogTag::Settlement,
                        &format!("Status poll for {} failed: {}", short_address(signature), e),
                    );
                }
            }
        }
    }
}
