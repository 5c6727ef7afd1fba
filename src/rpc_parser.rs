//! RPC Transaction Parser
//!
//! 把 JSON-RPC `getTransaction` 的返回（base64 / base58 二进制编码）
//! 转换成 gRPC 结构，再复用 gRPC 转换得到规范化视图。
//! 可以用于测试验证和离线分析。

use base64::{engine::general_purpose, Engine as _};
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, TransactionBinaryEncoding,
    UiInstruction, UiLoadedAddresses, UiTransactionTokenBalance,
};
use yellowstone_grpc_proto::prelude::{
    CompiledInstruction, InnerInstruction, InnerInstructions, Message, MessageAddressTableLookup,
    MessageHeader, TokenBalance, Transaction, TransactionStatusMeta, UiTokenAmount,
};

use crate::core::adapter::TransactionAdapter;
use crate::core::cache::MintDecimals;
use crate::core::config::ParseConfig;
use crate::core::error::ParseError;
use crate::core::events::ParseResult;
use crate::core::unified_parser::DexParser;
use crate::grpc::convert::adapter_from_grpc;

/// Parse a RPC transaction structure
///
/// # Example
/// ```no_run
/// use sol_meme_parser::{parse_rpc_transaction, MintDecimals, ParseConfig};
///
/// // Assuming you have an rpc_tx from RPC
/// // let result = parse_rpc_transaction(&rpc_tx, MintDecimals::default(), &ParseConfig::default()).unwrap();
/// ```
pub fn parse_rpc_transaction(
    rpc_tx: &EncodedConfirmedTransactionWithStatusMeta,
    decimals: MintDecimals,
    config: &ParseConfig,
) -> Result<ParseResult, ParseError> {
    let adapter = adapter_from_rpc(rpc_tx, decimals)?;
    DexParser::new().parse(&adapter, config, None)
}

/// RPC 交易 → 规范化视图
pub fn adapter_from_rpc(
    rpc_tx: &EncodedConfirmedTransactionWithStatusMeta,
    decimals: MintDecimals,
) -> Result<TransactionAdapter, ParseError> {
    let (grpc_meta, grpc_tx) = convert_rpc_to_grpc(rpc_tx)?;
    adapter_from_grpc(&grpc_tx, &grpc_meta, rpc_tx.slot, rpc_tx.block_time, decimals)
}

// ============================================================================
// Internal conversion functions
// ============================================================================

fn decode_versioned_transaction(ui_tx: &EncodedTransaction) -> Result<VersionedTransaction, ParseError> {
    let bytes = match ui_tx {
        EncodedTransaction::Binary(data, TransactionBinaryEncoding::Base64) => general_purpose::STANDARD
            .decode(data)
            .map_err(|e| ParseError::Conversion(format!("Failed to decode base64: {}", e)))?,
        EncodedTransaction::Binary(data, TransactionBinaryEncoding::Base58)
        | EncodedTransaction::LegacyBinary(data) => bs58::decode(data)
            .into_vec()
            .map_err(|e| ParseError::Conversion(format!("Failed to decode base58: {}", e)))?,
        EncodedTransaction::Json(_) => {
            return Err(ParseError::Conversion("JSON encoded transactions not supported yet".to_string()))
        }
        _ => return Err(ParseError::Conversion("Unsupported transaction encoding".to_string())),
    };

    bincode::deserialize(&bytes)
        .map_err(|e| ParseError::Conversion(format!("Failed to deserialize transaction: {}", e)))
}

fn parse_pubkey_bytes(s: &str) -> Result<Vec<u8>, ParseError> {
    s.parse::<Pubkey>()
        .map(|k| k.to_bytes().to_vec())
        .map_err(|e| ParseError::Conversion(format!("invalid pubkey {}: {}", s, e)))
}

fn convert_token_balance(balance: &UiTransactionTokenBalance) -> TokenBalance {
    let owner: Option<String> = balance.owner.clone().into();
    let program_id: Option<String> = balance.program_id.clone().into();
    TokenBalance {
        account_index: balance.account_index as u32,
        mint: balance.mint.clone(),
        ui_token_amount: Some(UiTokenAmount {
            ui_amount: balance.ui_token_amount.ui_amount.unwrap_or_default(),
            decimals: balance.ui_token_amount.decimals as u32,
            amount: balance.ui_token_amount.amount.clone(),
            ui_amount_string: balance.ui_token_amount.ui_amount_string.clone(),
        }),
        owner: owner.unwrap_or_default(),
        program_id: program_id.unwrap_or_default(),
    }
}

pub fn convert_rpc_to_grpc(
    rpc_tx: &EncodedConfirmedTransactionWithStatusMeta,
) -> Result<(TransactionStatusMeta, Transaction), ParseError> {
    let rpc_meta = rpc_tx.transaction.meta.as_ref().ok_or(ParseError::MissingField("meta"))?;

    let loaded: Option<UiLoadedAddresses> = rpc_meta.loaded_addresses.clone().into();
    let (loaded_writable_addresses, loaded_readonly_addresses) = match loaded {
        Some(addrs) => (
            addrs.writable.iter().map(|k| parse_pubkey_bytes(k)).collect::<Result<Vec<_>, _>>()?,
            addrs.readonly.iter().map(|k| parse_pubkey_bytes(k)).collect::<Result<Vec<_>, _>>()?,
        ),
        None => (Vec::new(), Vec::new()),
    };

    let token_balances = |balances: &Option<Vec<UiTransactionTokenBalance>>| -> Vec<TokenBalance> {
        balances.as_ref().map(|b| b.iter().map(convert_token_balance).collect()).unwrap_or_default()
    };
    let pre_token: Option<Vec<UiTransactionTokenBalance>> = rpc_meta.pre_token_balances.clone().into();
    let post_token: Option<Vec<UiTransactionTokenBalance>> = rpc_meta.post_token_balances.clone().into();
    let log_messages: Option<Vec<String>> = rpc_meta.log_messages.clone().into();

    let mut grpc_meta = TransactionStatusMeta {
        fee: rpc_meta.fee,
        pre_balances: rpc_meta.pre_balances.clone(),
        post_balances: rpc_meta.post_balances.clone(),
        log_messages_none: log_messages.is_none(),
        log_messages: log_messages.unwrap_or_default(),
        pre_token_balances: token_balances(&pre_token),
        post_token_balances: token_balances(&post_token),
        loaded_writable_addresses,
        loaded_readonly_addresses,
        compute_units_consumed: rpc_meta.compute_units_consumed.clone().into(),
        ..Default::default()
    };

    // Convert inner instructions
    let inner_instructions: Option<Vec<_>> = rpc_meta.inner_instructions.clone().into();
    grpc_meta.inner_instructions_none = inner_instructions.is_none();
    for inner in inner_instructions.iter().flatten() {
        let mut grpc_inner = InnerInstructions { index: inner.index as u32, instructions: Vec::new() };

        for ix in &inner.instructions {
            if let UiInstruction::Compiled(compiled) = ix {
                let data = bs58::decode(&compiled.data).into_vec().map_err(|e| {
                    ParseError::Conversion(format!("Failed to decode instruction data: {}", e))
                })?;

                grpc_inner.instructions.push(InnerInstruction {
                    program_id_index: compiled.program_id_index as u32,
                    accounts: compiled.accounts.clone(),
                    data,
                    stack_height: compiled.stack_height,
                });
            }
        }

        grpc_meta.inner_instructions.push(grpc_inner);
    }

    // Convert transaction
    let versioned_tx = decode_versioned_transaction(&rpc_tx.transaction.transaction)?;
    let signatures = versioned_tx.signatures.iter().map(|s| s.as_ref().to_vec()).collect();
    let message = convert_message(&versioned_tx.message);

    Ok((grpc_meta, Transaction { signatures, message: Some(message) }))
}

fn convert_message(msg: &VersionedMessage) -> Message {
    let header = msg.header();
    let instructions = msg
        .instructions()
        .iter()
        .map(|ix| CompiledInstruction {
            program_id_index: ix.program_id_index as u32,
            accounts: ix.accounts.clone(),
            data: ix.data.clone(),
        })
        .collect();

    let (versioned, address_table_lookups) = match msg {
        VersionedMessage::Legacy(_) => (false, Vec::new()),
        VersionedMessage::V0(v0) => (
            true,
            v0.address_table_lookups
                .iter()
                .map(|lookup| MessageAddressTableLookup {
                    account_key: lookup.account_key.to_bytes().to_vec(),
                    writable_indexes: lookup.writable_indexes.clone(),
                    readonly_indexes: lookup.readonly_indexes.clone(),
                })
                .collect(),
        ),
    };

    Message {
        header: Some(MessageHeader {
            num_required_signatures: header.num_required_signatures as u32,
            num_readonly_signed_accounts: header.num_readonly_signed_accounts as u32,
            num_readonly_unsigned_accounts: header.num_readonly_unsigned_accounts as u32,
        }),
        account_keys: msg.static_account_keys().iter().map(|k| k.to_bytes().to_vec()).collect(),
        recent_blockhash: msg.recent_blockhash().to_bytes().to_vec(),
        instructions,
        versioned,
        address_table_lookups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::{AccountMeta, Instruction as SdkInstruction};
    use solana_sdk::message::Message as LegacyMessage;
    use solana_sdk::transaction::Transaction as SdkTransaction;
    use solana_transaction_status::option_serializer::OptionSerializer;
    use solana_transaction_status::{
        EncodedTransactionWithStatusMeta, TransactionStatusMeta as RpcStatusMeta, UiTransactionStatusMeta,
    };

    use crate::instr::boopfun::discriminators as boop;
    use crate::instr::program_ids::BOOPFUN_PROGRAM_ID;

    fn encoded(payer: Pubkey, accounts: &[Pubkey], data: Vec<u8>, base58: bool) -> EncodedTransaction {
        let metas = accounts.iter().map(|k| AccountMeta::new_readonly(*k, false)).collect();
        let ix = SdkInstruction { program_id: BOOPFUN_PROGRAM_ID, accounts: metas, data };
        let tx = VersionedTransaction::from(SdkTransaction::new_unsigned(LegacyMessage::new(&[ix], Some(&payer))));
        let bytes = bincode::serialize(&tx).unwrap();
        if base58 {
            EncodedTransaction::Binary(bs58::encode(bytes).into_string(), TransactionBinaryEncoding::Base58)
        } else {
            EncodedTransaction::Binary(general_purpose::STANDARD.encode(bytes), TransactionBinaryEncoding::Base64)
        }
    }

    fn rpc_tx(transaction: EncodedTransaction, meta: Option<UiTransactionStatusMeta>) -> EncodedConfirmedTransactionWithStatusMeta {
        EncodedConfirmedTransactionWithStatusMeta {
            slot: 300,
            transaction: EncodedTransactionWithStatusMeta { transaction, meta, version: None },
            block_time: Some(1_700_000_123),
        }
    }

    fn sell_data() -> Vec<u8> {
        let mut data = boop::SELL_TOKEN.to_vec();
        data.extend_from_slice(&5u64.to_le_bytes());
        data
    }

    #[test]
    fn test_convert_legacy_transaction() {
        let payer = Pubkey::new_unique();
        let accounts: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
        let meta = UiTransactionStatusMeta::from(RpcStatusMeta::default());
        for base58 in [false, true] {
            let tx = rpc_tx(encoded(payer, &accounts, sell_data(), base58), Some(meta.clone()));

            let adapter = adapter_from_rpc(&tx, MintDecimals::default()).unwrap();
            assert_eq!(adapter.slot(), 300);
            assert_eq!(adapter.block_time(), 1_700_000_123);
            assert_eq!(adapter.signer(), payer);
            assert_eq!(adapter.instructions().len(), 1);
            assert_eq!(adapter.instructions()[0].program_id, BOOPFUN_PROGRAM_ID);
            assert_eq!(adapter.instructions()[0].accounts, accounts);
            assert_eq!(adapter.instructions()[0].data, sell_data());
        }
    }

    #[test]
    fn test_token_balances_from_rpc() {
        let payer = Pubkey::new_unique();
        let accounts: Vec<Pubkey> = (0..2).map(|_| Pubkey::new_unique()).collect();
        let mint = Pubkey::new_unique();
        let balance: UiTransactionTokenBalance = serde_json::from_value(serde_json::json!({
            "accountIndex": 1,
            "mint": mint.to_string(),
            "uiTokenAmount": {"uiAmount": 2.5, "decimals": 6, "amount": "2500000", "uiAmountString": "2.5"},
            "owner": payer.to_string(),
            "programId": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        }))
        .unwrap();
        let mut meta = UiTransactionStatusMeta::from(RpcStatusMeta::default());
        meta.post_token_balances = OptionSerializer::Some(vec![balance]);

        let tx = rpc_tx(encoded(payer, &accounts, sell_data(), false), Some(meta));
        let adapter = adapter_from_rpc(&tx, MintDecimals::default()).unwrap();
        let account = adapter.transaction().account_keys[1];
        assert_eq!(adapter.token_account_info(&account).map(|i| i.mint), Some(mint));
        assert_eq!(adapter.mint_decimals(&mint), Ok(6));
    }

    #[test]
    fn test_missing_meta_and_json_encoding() {
        let payer = Pubkey::new_unique();
        let tx = rpc_tx(encoded(payer, &[], vec![], false), None);
        assert!(matches!(adapter_from_rpc(&tx, MintDecimals::default()), Err(ParseError::MissingField("meta"))));

        let meta = UiTransactionStatusMeta::from(RpcStatusMeta::default());
        let tx = rpc_tx(EncodedTransaction::LegacyBinary("0OIl".to_string()), Some(meta));
        assert!(matches!(convert_rpc_to_grpc(&tx), Err(ParseError::Conversion(_))));
    }
}
