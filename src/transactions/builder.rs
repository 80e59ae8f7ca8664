//! Unsigned transaction construction
//!
//! Swaps are assembled by the routing API from a fresh quote. Transfers are
//! built locally: a system transfer for SOL, or `transfer_checked` into the
//! recipient's associated token account (created idempotently when missing).

use super::types::{PendingTransaction, TransactionIntent, TransferIntent};
use crate::balances::Balance;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::quotes::Quote;
use crate::routers::SwapAssemblyApi;
use crate::rpc::NodeRpc;
use crate::tokens::{format_raw_amount_trimmed, parse_ui_amount, Asset};
use crate::utils::{short_address, with_timeout};
use base64::Engine;
use solana_sdk::{
    instruction::Instruction, message::Message, pubkey::Pubkey, system_instruction,
    transaction::{Transaction, VersionedTransaction},
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account_idempotent,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Direct transfer as entered by the user
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub owner: &'a str,
    pub asset: &'a Asset,
    pub recipient: &'a str,
    /// Human units
    pub amount: &'a str,
    /// Last known spendable holding of `asset`
    pub holding: &'a Balance,
}

pub struct TransactionBuilder {
    rpc: Arc<dyn NodeRpc>,
    assembly: Arc<dyn SwapAssemblyApi>,
    rpc_timeout: Duration,
    assembly_timeout: Duration,
}

fn parse_pubkey(value: &str) -> Option<Pubkey> {
    Pubkey::from_str(value.trim()).ok()
}

/// Amount checks shared by the builder and the orchestrator's validation step
///
/// Pure: runs before any network call.
pub fn validate_transfer_amount(
    asset: &Asset,
    amount: &str,
    holding: &Balance,
) -> Result<u64, FlowError> {
    let amount_raw = parse_ui_amount(amount, holding.asset.decimals)?;

    if amount_raw == 0 {
        return Err(FlowError::invalid_amount("amount must be greater than zero"));
    }

    if amount_raw > holding.raw_amount {
        return Err(FlowError::InsufficientBalance {
            requested: format!("{} {}", amount.trim(), asset.symbol),
            available: format!(
                "{} {}",
                format_raw_amount_trimmed(holding.raw_amount, holding.asset.decimals),
                asset.symbol
            ),
        });
    }

    Ok(amount_raw)
}

impl TransactionBuilder {
    pub fn new(
        rpc: Arc<dyn NodeRpc>,
        assembly: Arc<dyn SwapAssemblyApi>,
        rpc_timeout: Duration,
        assembly_timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            assembly,
            rpc_timeout,
            assembly_timeout,
        }
    }

    /// Assemble the transaction for a quoted swap
    pub async fn build_swap(
        &self,
        quote: &Quote,
        payer: &str,
    ) -> Result<PendingTransaction, FlowError> {
        let payer_key = parse_pubkey(payer).ok_or_else(|| FlowError::InvalidAddress {
            address: payer.to_string(),
        })?;

        if !quote.is_fresh() {
            return Err(FlowError::quote_expired(format!(
                "quote {} is {}s old",
                quote.id,
                quote.age().as_secs()
            )));
        }

        let assembled = with_timeout(
            self.assembly_timeout,
            "Swap assembly",
            self.assembly.assemble_swap(&quote.reference, &payer_key.to_string()),
        )
        .await?;

        let payload = base64::engine::general_purpose::STANDARD
            .decode(assembled.transaction_base64.trim())
            .map_err(|e| FlowError::build_failed(format!("Invalid transaction encoding: {}", e)))?;

        let transaction: VersionedTransaction = bincode::deserialize(&payload)
            .map_err(|e| FlowError::build_failed(format!("Invalid transaction payload: {}", e)))?;

        let fee_payer = transaction.message.static_account_keys().first().copied();
        if fee_payer != Some(payer_key) {
            return Err(FlowError::build_failed(format!(
                "Assembled transaction pays from {:?}, expected {}",
                fee_payer.map(|k| k.to_string()),
                payer_key
            )));
        }

        let pending = PendingTransaction::new(
            payload,
            TransactionIntent::Swap(quote.clone()),
            assembled.last_valid_block_height,
        );

        logger::debug(
            LogTag::Swap,
            &format!(
                "Built swap transaction {} ({} bytes)",
                pending.correlation_id,
                pending.payload.len()
            ),
        );

        Ok(pending)
    }

    /// Build a direct transfer
    ///
    /// Recipient and amount are validated before any network call.
    pub async fn build_transfer(
        &self,
        request: &TransferRequest<'_>,
    ) -> Result<PendingTransaction, FlowError> {
        let owner = parse_pubkey(request.owner).ok_or_else(|| FlowError::InvalidAddress {
            address: request.owner.to_string(),
        })?;
        let recipient =
            parse_pubkey(request.recipient).ok_or_else(|| FlowError::InvalidRecipient {
                address: request.recipient.to_string(),
            })?;

        let amount_raw = validate_transfer_amount(request.asset, request.amount, request.holding)?;

        let mut instructions: Vec<Instruction> = Vec::new();
        let mut intent = TransferIntent {
            asset: request.holding.asset.clone(),
            owner: owner.to_string(),
            recipient: recipient.to_string(),
            amount_raw,
            source_account: None,
            destination_account: None,
            creates_destination_account: false,
        };

        if request.asset.native {
            instructions.push(system_instruction::transfer(&owner, &recipient, amount_raw));
        } else {
            self.push_token_transfer(&mut instructions, &mut intent, &owner, &recipient, request)
                .await?;
        }

        let (blockhash, last_valid_block_height) = with_timeout(
            self.rpc_timeout,
            "getLatestBlockhash",
            async { self.rpc.get_latest_blockhash().await.map_err(FlowError::from) },
        )
        .await
        .map_err(|e| match e {
            FlowError::UpstreamUnavailable { .. } => e,
            other => FlowError::build_failed(other.to_string()),
        })?;

        let message = Message::new_with_blockhash(&instructions, Some(&owner), &blockhash);
        let transaction = VersionedTransaction::from(Transaction::new_unsigned(message));
        let payload = bincode::serialize(&transaction)
            .map_err(|e| FlowError::build_failed(format!("Failed to serialize transaction: {}", e)))?;

        logger::debug(
            LogTag::Transfer,
            &format!(
                "Built transfer of {} {} to {} ({} instructions)",
                intent.amount(),
                intent.asset.symbol,
                short_address(&intent.recipient),
                instructions.len()
            ),
        );

        Ok(PendingTransaction::new(
            payload,
            TransactionIntent::Transfer(intent),
            Some(last_valid_block_height),
        ))
    }

    async fn push_token_transfer(
        &self,
        instructions: &mut Vec<Instruction>,
        intent: &mut TransferIntent,
        owner: &Pubkey,
        recipient: &Pubkey,
        request: &TransferRequest<'_>,
    ) -> Result<(), FlowError> {
        let mint = parse_pubkey(&request.asset.address).ok_or_else(|| {
            FlowError::build_failed(format!("Invalid mint address {}", request.asset.address))
        })?;

        let token_program = if request.holding.is_token_2022 {
            spl_token_2022::id()
        } else {
            spl_token::id()
        };

        let source = match request.holding.token_account.as_deref() {
            Some(account) => parse_pubkey(account).ok_or_else(|| {
                FlowError::build_failed(format!("Invalid source token account {}", account))
            })?,
            None => get_associated_token_address_with_program_id(owner, &mint, &token_program),
        };

        let destination =
            get_associated_token_address_with_program_id(recipient, &mint, &token_program);

        // Lookup errors are resolution failures; an expired wait stays UpstreamUnavailable
        let exists = with_timeout(self.rpc_timeout, "getAccountInfo", async {
            self.rpc
                .account_exists(&destination)
                .await
                .map_err(|e| FlowError::AccountResolutionFailed {
                    message: format!(
                        "Could not resolve token account for {}: {}",
                        short_address(&recipient.to_string()),
                        e
                    ),
                })
        })
        .await?;

        if !exists {
            logger::info(
                LogTag::Transfer,
                &format!(
                    "Recipient {} has no {} account, creating {}",
                    short_address(&recipient.to_string()),
                    request.asset.symbol,
                    short_address(&destination.to_string())
                ),
            );
            instructions.push(create_associated_token_account_idempotent(
                owner,
                recipient,
                &mint,
                &token_program,
            ));
        }

        let decimals = request.holding.asset.decimals;
        let transfer = if request.holding.is_token_2022 {
            spl_token_2022::instruction::transfer_checked(
                &token_program,
                &source,
                &mint,
                &destination,
                owner,
                &[],
                intent.amount_raw,
                decimals,
            )
            .map_err(|e| e.to_string())
        } else {
            spl_token::instruction::transfer_checked(
                &token_program,
                &source,
                &mint,
                &destination,
                owner,
                &[],
                intent.amount_raw,
                decimals,
            )
            .map_err(|e| e.to_string())
        }
        .map_err(|e| FlowError::build_failed(format!("Failed to build token transfer: {}", e)))?;

        instructions.push(transfer);

        intent.source_account = Some(source.to_string());
        intent.destination_account = Some(destination.to_string());
        intent.creates_destination_account = !exists;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::balances::aggregator::tests::FakeRpc;
    use crate::constants::USDC_MINT;
    use crate::routers::AssembledSwap;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use solana_sdk::system_program;

    /// Assembly double returning a canned transaction paid by `payer`
    pub(crate) struct FakeAssembly {
        pub payer: Mutex<Option<Pubkey>>,
        pub error: Mutex<Option<FlowError>>,
        pub calls: Mutex<usize>,
    }

    impl Default for FakeAssembly {
        fn default() -> Self {
            Self {
                payer: Mutex::new(None),
                error: Mutex::new(None),
                calls: Mutex::new(0),
            }
        }
    }

    pub(crate) fn unsigned_transaction_base64(payer: &Pubkey) -> String {
        let message = Message::new(
            &[system_instruction::transfer(payer, &Pubkey::new_unique(), 1)],
            Some(payer),
        );
        let transaction = VersionedTransaction::from(Transaction::new_unsigned(message));
        base64::engine::general_purpose::STANDARD.encode(bincode::serialize(&transaction).unwrap())
    }

    #[async_trait::async_trait]
    impl SwapAssemblyApi for FakeAssembly {
        async fn assemble_swap(
            &self,
            _reference: &Value,
            payer: &str,
        ) -> Result<AssembledSwap, FlowError> {
            *self.calls.lock() += 1;
            if let Some(error) = self.error.lock().clone() {
                return Err(error);
            }
            let fixed = *self.payer.lock();
            let payer = fixed.unwrap_or_else(|| Pubkey::from_str(payer).unwrap());
            Ok(AssembledSwap {
                transaction_base64: unsigned_transaction_base64(&payer),
                last_valid_block_height: Some(500),
            })
        }
    }

    fn builder(rpc: Arc<FakeRpc>, assembly: Arc<FakeAssembly>) -> TransactionBuilder {
        TransactionBuilder::new(
            rpc,
            assembly,
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
    }

    fn decode(pending: &PendingTransaction) -> VersionedTransaction {
        bincode::deserialize(&pending.payload).unwrap()
    }

    fn token_x() -> Asset {
        Asset::new("XMint11111111111111111111111111111111111111", "X", "Token X", 9)
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected_before_network() {
        let rpc = Arc::new(FakeRpc::default());
        let assembly = Arc::new(FakeAssembly::default());
        let owner = Pubkey::new_unique().to_string();
        let x = token_x();
        let holding = Balance::token(&owner, x.clone(), 2_500_000_000, &Pubkey::new_unique().to_string(), false);

        let err = builder(rpc.clone(), assembly.clone())
            .build_transfer(&TransferRequest {
                owner: &owner,
                asset: &x,
                recipient: &Pubkey::new_unique().to_string(),
                amount: "3.0",
                holding: &holding,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::InsufficientBalance { .. }));
        assert!(rpc.calls().is_empty());
        assert_eq!(*assembly.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let rpc = Arc::new(FakeRpc::default());
        let owner = Pubkey::new_unique().to_string();
        let holding = Balance::native(&owner, 1_000_000_000);

        let err = builder(rpc.clone(), Arc::new(FakeAssembly::default()))
            .build_transfer(&TransferRequest {
                owner: &owner,
                asset: &Asset::sol(),
                recipient: "definitely-not-base58!",
                amount: "0.1",
                holding: &holding,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::InvalidRecipient { .. }));
        assert!(rpc.calls().is_empty());
    }

    #[tokio::test]
    async fn test_native_transfer_is_single_system_instruction() {
        let rpc = Arc::new(FakeRpc::default());
        let owner = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let holding = Balance::native(&owner.to_string(), 2_000_000_000);

        let pending = builder(rpc.clone(), Arc::new(FakeAssembly::default()))
            .build_transfer(&TransferRequest {
                owner: &owner.to_string(),
                asset: &Asset::sol(),
                recipient: &recipient.to_string(),
                amount: "1.23456789912",
                holding: &holding,
            })
            .await
            .unwrap();

        let tx = decode(&pending);
        let keys = tx.message.static_account_keys();
        assert_eq!(keys[0], owner);
        assert_eq!(tx.message.instructions().len(), 1);
        let program = keys[tx.message.instructions()[0].program_id_index as usize];
        assert_eq!(program, system_program::id());
        assert_eq!(rpc.calls(), vec!["getLatestBlockhash".to_string()]);

        match &pending.intent {
            TransactionIntent::Transfer(intent) => assert_eq!(intent.amount_raw, 1_234_567_899),
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_transfer_creates_missing_account() {
        let rpc = Arc::new(FakeRpc::default());
        let owner = Pubkey::new_unique();
        let usdc = Asset::new(USDC_MINT, "USDC", "USD Coin", 6);
        let holding = Balance::token(&owner.to_string(), usdc.clone(), 5_000_000, &Pubkey::new_unique().to_string(), false);

        let pending = builder(rpc.clone(), Arc::new(FakeAssembly::default()))
            .build_transfer(&TransferRequest {
                owner: &owner.to_string(),
                asset: &usdc,
                recipient: &Pubkey::new_unique().to_string(),
                amount: "1.5",
                holding: &holding,
            })
            .await
            .unwrap();

        assert_eq!(decode(&pending).message.instructions().len(), 2);
        match &pending.intent {
            TransactionIntent::Transfer(intent) => {
                assert!(intent.creates_destination_account);
                assert_eq!(intent.amount_raw, 1_500_000);
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_transfer_reuses_existing_account() {
        let rpc = Arc::new(FakeRpc::default());
        let owner = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let mint = Pubkey::from_str(USDC_MINT).unwrap();
        rpc.existing_accounts.lock().push(get_associated_token_address_with_program_id(
            &recipient,
            &mint,
            &spl_token::id(),
        ));

        let usdc = Asset::new(USDC_MINT, "USDC", "USD Coin", 6);
        let holding = Balance::token(&owner.to_string(), usdc.clone(), 5_000_000, &Pubkey::new_unique().to_string(), false);

        let pending = builder(rpc, Arc::new(FakeAssembly::default()))
            .build_transfer(&TransferRequest {
                owner: &owner.to_string(),
                asset: &usdc,
                recipient: &recipient.to_string(),
                amount: "5",
                holding: &holding,
            })
            .await
            .unwrap();

        assert_eq!(decode(&pending).message.instructions().len(), 1);
    }

    #[tokio::test]
    async fn test_account_lookup_failure() {
        let rpc = Arc::new(FakeRpc::default());
        *rpc.account_lookup_fails.lock() = true;
        let owner = Pubkey::new_unique().to_string();
        let usdc = Asset::new(USDC_MINT, "USDC", "USD Coin", 6);
        let holding = Balance::token(&owner, usdc.clone(), 5_000_000, &Pubkey::new_unique().to_string(), false);

        let err = builder(rpc, Arc::new(FakeAssembly::default()))
            .build_transfer(&TransferRequest {
                owner: &owner,
                asset: &usdc,
                recipient: &Pubkey::new_unique().to_string(),
                amount: "1",
                holding: &holding,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::AccountResolutionFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_account_lookup_is_upstream_unavailable() {
        let rpc = Arc::new(FakeRpc::default());
        *rpc.lookup_delay.lock() = Some(Duration::from_secs(5));
        let owner = Pubkey::new_unique().to_string();
        let usdc = Asset::new(USDC_MINT, "USDC", "USD Coin", 6);
        let holding = Balance::token(&owner, usdc.clone(), 5_000_000, &Pubkey::new_unique().to_string(), false);

        let err = builder(rpc.clone(), Arc::new(FakeAssembly::default()))
            .build_transfer(&TransferRequest {
                owner: &owner,
                asset: &usdc,
                recipient: &Pubkey::new_unique().to_string(),
                amount: "1",
                holding: &holding,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::UpstreamUnavailable { .. }));
        assert!(!rpc.calls().iter().any(|c| c == "getLatestBlockhash"));
    }

    fn quote(validity: Duration) -> Quote {
        Quote::new(
            Asset::sol(),
            Asset::new(USDC_MINT, "USDC", "USD Coin", 6),
            1_000_000_000,
            25_000_000,
            50,
            0.0,
            "Direct".to_string(),
            json!({"outAmount": "25000000"}),
            validity,
        )
    }

    #[tokio::test]
    async fn test_stale_quote_is_not_assembled() {
        let assembly = Arc::new(FakeAssembly::default());
        let err = builder(Arc::new(FakeRpc::default()), assembly.clone())
            .build_swap(&quote(Duration::ZERO), &Pubkey::new_unique().to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::QuoteExpired { .. }));
        assert_eq!(*assembly.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_swap_payload_is_checked() {
        let payer = Pubkey::new_unique();
        let assembly = Arc::new(FakeAssembly::default());
        let b = builder(Arc::new(FakeRpc::default()), assembly.clone());

        let pending = b
            .build_swap(&quote(Duration::from_secs(30)), &payer.to_string())
            .await
            .unwrap();
        assert_eq!(pending.last_valid_block_height, Some(500));
        assert_eq!(decode(&pending).message.static_account_keys()[0], payer);

        // Payload paid by someone else is refused
        *assembly.payer.lock() = Some(Pubkey::new_unique());
        let err = b
            .build_swap(&quote(Duration::from_secs(30)), &payer.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::BuildFailed { .. }));
    }
}
