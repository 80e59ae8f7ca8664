//! Node RPC methods used by the balance, transaction and settlement paths
//!
//! `NodeRpc` is the seam the rest of the crate depends on; `RpcClient`
//! implements it over raw JSON-RPC.

use super::RpcClient;
use crate::constants::TOKEN_2022_PROGRAM_ID;
use crate::rpc::types::{RpcError, RpcResult, SignatureInfo, SignatureStatus, TokenAccountInfo};
use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::{hash::Hash, pubkey::Pubkey};
use std::str::FromStr;

#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Native balance in lamports
    async fn get_balance(&self, address: &Pubkey) -> RpcResult<u64>;

    /// Token accounts owned by `owner` under one token program
    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> RpcResult<Vec<TokenAccountInfo>>;

    /// Most recent signatures involving `address`, newest first
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> RpcResult<Vec<SignatureInfo>>;

    async fn account_exists(&self, address: &Pubkey) -> RpcResult<bool>;

    /// Latest blockhash and its last valid block height
    async fn get_latest_blockhash(&self) -> RpcResult<(Hash, u64)>;

    /// `None` while the cluster has not seen the signature
    async fn get_signature_status(&self, signature: &str) -> RpcResult<Option<SignatureStatus>>;

    /// Submit a base64 encoded, fully signed transaction
    async fn send_transaction(&self, transaction_base64: &str) -> RpcResult<String>;
}

#[async_trait]
impl NodeRpc for RpcClient {
    async fn get_balance(&self, address: &Pubkey) -> RpcResult<u64> {
        let result = self
            .execute_raw(
                "getBalance",
                json!([address.to_string(), { "commitment": self.commitment() }]),
            )
            .await?;

        result
            .get("value")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| RpcError::InvalidResponse("getBalance value missing".to_string()))
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> RpcResult<Vec<TokenAccountInfo>> {
        let result = self
            .execute_raw(
                "getTokenAccountsByOwner",
                json!([
                    owner.to_string(),
                    { "programId": program_id.to_string() },
                    { "encoding": "jsonParsed", "commitment": self.commitment() }
                ]),
            )
            .await?;

        let accounts = result
            .get("value")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                RpcError::InvalidResponse("getTokenAccountsByOwner value missing".to_string())
            })?;

        accounts
            .iter()
            .map(|account| parse_token_account_info(account, &program_id.to_string()))
            .collect()
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> RpcResult<Vec<SignatureInfo>> {
        let result = self
            .execute_raw(
                "getSignaturesForAddress",
                json!([address.to_string(), { "limit": limit }]),
            )
            .await?;

        let entries = result.as_array().ok_or_else(|| {
            RpcError::InvalidResponse("getSignaturesForAddress result is not an array".to_string())
        })?;

        entries.iter().map(parse_signature_info).collect()
    }

    async fn account_exists(&self, address: &Pubkey) -> RpcResult<bool> {
        let result = self
            .execute_raw(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment(), "dataSlice": { "offset": 0, "length": 0 } }
                ]),
            )
            .await?;

        Ok(result.get("value").map_or(false, |v| !v.is_null()))
    }

    async fn get_latest_blockhash(&self) -> RpcResult<(Hash, u64)> {
        let result = self
            .execute_raw(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment() }]),
            )
            .await?;

        let value = result
            .get("value")
            .ok_or_else(|| RpcError::InvalidResponse("getLatestBlockhash value missing".to_string()))?;

        let blockhash = value
            .get("blockhash")
            .and_then(|b| b.as_str())
            .ok_or_else(|| RpcError::InvalidResponse("blockhash missing".to_string()))
            .and_then(|b| {
                Hash::from_str(b)
                    .map_err(|e| RpcError::InvalidResponse(format!("Invalid blockhash: {}", e)))
            })?;

        let last_valid_block_height = value
            .get("lastValidBlockHeight")
            .and_then(|h| h.as_u64())
            .ok_or_else(|| RpcError::InvalidResponse("lastValidBlockHeight missing".to_string()))?;

        Ok((blockhash, last_valid_block_height))
    }

    async fn get_signature_status(&self, signature: &str) -> RpcResult<Option<SignatureStatus>> {
        let result = self
            .execute_raw(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": false }]),
            )
            .await?;

        let status = result
            .get("value")
            .and_then(|v| v.as_array())
            .and_then(|values| values.first())
            .ok_or_else(|| {
                RpcError::InvalidResponse("getSignatureStatuses value missing".to_string())
            })?;

        if status.is_null() {
            return Ok(None);
        }

        Ok(Some(SignatureStatus {
            slot: status.get("slot").and_then(|s| s.as_u64()).unwrap_or(0),
            confirmation_status: status
                .get("confirmationStatus")
                .and_then(|s| s.as_str())
                .map(|s| s.to_string()),
            err: status
                .get("err")
                .filter(|e| !e.is_null())
                .map(|e| e.to_string()),
        }))
    }

    async fn send_transaction(&self, transaction_base64: &str) -> RpcResult<String> {
        let result = self
            .execute_raw(
                "sendTransaction",
                json!([
                    transaction_base64,
                    { "encoding": "base64", "preflightCommitment": self.commitment() }
                ]),
            )
            .await?;

        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| RpcError::InvalidResponse("sendTransaction result is not a signature".to_string()))
    }
}

/// Parse one jsonParsed entry of getTokenAccountsByOwner
fn parse_token_account_info(entry: &Value, program_id: &str) -> RpcResult<TokenAccountInfo> {
    let invalid = |what: &str| RpcError::InvalidResponse(format!("token account {} missing", what));

    let account = entry
        .get("pubkey")
        .and_then(|p| p.as_str())
        .ok_or_else(|| invalid("pubkey"))?;

    let info = entry
        .pointer("/account/data/parsed/info")
        .ok_or_else(|| invalid("parsed info"))?;

    let mint = info
        .get("mint")
        .and_then(|m| m.as_str())
        .ok_or_else(|| invalid("mint"))?;

    let owner = info.get("owner").and_then(|o| o.as_str()).unwrap_or("");

    let token_amount = info.get("tokenAmount").ok_or_else(|| invalid("tokenAmount"))?;

    let amount = token_amount
        .get("amount")
        .and_then(|a| a.as_str())
        .and_then(|a| a.parse::<u64>().ok())
        .ok_or_else(|| invalid("amount"))?;

    let decimals = token_amount
        .get("decimals")
        .and_then(|d| d.as_u64())
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| invalid("decimals"))?;

    let program_id = entry
        .pointer("/account/owner")
        .and_then(|o| o.as_str())
        .unwrap_or(program_id);

    Ok(TokenAccountInfo {
        account: account.to_string(),
        mint: mint.to_string(),
        owner: owner.to_string(),
        amount,
        decimals,
        program_id: program_id.to_string(),
        is_token_2022: program_id == TOKEN_2022_PROGRAM_ID,
    })
}

fn parse_signature_info(entry: &Value) -> RpcResult<SignatureInfo> {
    let signature = entry
        .get("signature")
        .and_then(|s| s.as_str())
        .ok_or_else(|| RpcError::InvalidResponse("signature missing".to_string()))?;

    Ok(SignatureInfo {
        signature: signature.to_string(),
        slot: entry.get("slot").and_then(|s| s.as_u64()).unwrap_or(0),
        block_time: entry.get("blockTime").and_then(|t| t.as_i64()),
        succeeded: entry.get("err").map_or(true, |e| e.is_null()),
        memo: entry
            .get("memo")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SPL_TOKEN_PROGRAM_ID;
    use std::time::Duration;

    fn client_for(server: &mockito::Server) -> RpcClient {
        RpcClient::new(&server.url(), Duration::from_secs(2), "confirmed").unwrap()
    }

    #[tokio::test]
    async fn test_get_balance() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({"method": "getBalance"})))
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":1},"value":2500000000}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let balance = client.get_balance(&Pubkey::new_unique()).await.unwrap();
        assert_eq!(balance, 2_500_000_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rpc_error_is_typed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid param"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_balance(&Pubkey::new_unique()).await.unwrap_err();
        assert_eq!(
            err,
            RpcError::Rpc {
                code: -32602,
                message: "Invalid param".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_http_failure_is_typed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_latest_blockhash().await.unwrap_err();
        assert_eq!(err, RpcError::HttpStatus { status: 503 });
    }

    #[test]
    fn test_parse_token_account() {
        let entry = json!({
            "pubkey": "AccountPubkey111111111111111111111111111111",
            "account": {
                "owner": TOKEN_2022_PROGRAM_ID,
                "data": {
                    "parsed": {
                        "info": {
                            "mint": "Mint111111111111111111111111111111111111111",
                            "owner": "Owner11111111111111111111111111111111111111",
                            "tokenAmount": { "amount": "1500000", "decimals": 6, "uiAmount": 1.5 }
                        }
                    }
                }
            }
        });

        let info = parse_token_account_info(&entry, SPL_TOKEN_PROGRAM_ID).unwrap();
        assert_eq!(info.amount, 1_500_000);
        assert_eq!(info.decimals, 6);
        assert!(info.is_token_2022);
        assert_eq!(info.program_id, TOKEN_2022_PROGRAM_ID);

        assert!(parse_token_account_info(&json!({"pubkey": "x"}), SPL_TOKEN_PROGRAM_ID).is_err());
    }

    #[test]
    fn test_parse_signature_info() {
        let ok = parse_signature_info(&json!({"signature": "sig1", "slot": 10, "blockTime": 1700000000, "err": null})).unwrap();
        assert!(ok.succeeded);
        assert_eq!(ok.block_time, Some(1_700_000_000));

        let failed = parse_signature_info(&json!({"signature": "sig2", "slot": 11, "err": {"InstructionError": [0, "Custom"]}})).unwrap();
        assert!(!failed.succeeded);
    }
}
