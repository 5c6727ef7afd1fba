//! Yellowstone `Transaction` + `TransactionStatusMeta` → [`SolanaTransaction`]
//!
//! 账户顺序：静态账户、ALT 可写地址、ALT 只读地址。

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use yellowstone_grpc_proto::prelude::{
    Message, TokenBalance as GrpcTokenBalance, Transaction, TransactionStatusMeta,
};

use crate::core::adapter::{InnerInstructionSet, Instruction, SolanaTransaction, TokenBalance, TransactionAdapter};
use crate::core::cache::MintDecimals;
use crate::core::error::ParseError;

#[inline]
fn pubkey_from_bytes(bytes: &[u8]) -> Result<Pubkey, ParseError> {
    Pubkey::try_from(bytes)
        .map_err(|_| ParseError::Conversion(format!("invalid pubkey length {}", bytes.len())))
}

fn pubkey_from_str(s: &str) -> Result<Pubkey, ParseError> {
    s.parse().map_err(|e| ParseError::Conversion(format!("invalid pubkey {s}: {e}")))
}

/// 完整账户表
fn resolve_account_keys(msg: &Message, meta: &TransactionStatusMeta) -> Result<Vec<Pubkey>, ParseError> {
    msg.account_keys
        .iter()
        .chain(meta.loaded_writable_addresses.iter())
        .chain(meta.loaded_readonly_addresses.iter())
        .map(|k| pubkey_from_bytes(k))
        .collect()
}

fn key_at(keys: &[Pubkey], index: usize) -> Result<Pubkey, ParseError> {
    keys.get(index)
        .copied()
        .ok_or_else(|| ParseError::Conversion(format!("account index {index} out of range ({})", keys.len())))
}

fn resolve_instruction(
    keys: &[Pubkey],
    program_id_index: u32,
    accounts: &[u8],
    data: &[u8],
) -> Result<Instruction, ParseError> {
    Ok(Instruction {
        program_id: key_at(keys, program_id_index as usize)?,
        accounts: accounts.iter().map(|&i| key_at(keys, i as usize)).collect::<Result<_, _>>()?,
        data: data.to_vec(),
    })
}

fn convert_token_balance(keys: &[Pubkey], balance: &GrpcTokenBalance) -> Result<TokenBalance, ParseError> {
    let ui = balance.ui_token_amount.as_ref().ok_or(ParseError::MissingField("ui_token_amount"))?;
    let amount_raw = ui
        .amount
        .parse::<u128>()
        .map_err(|e| ParseError::Conversion(format!("invalid token amount {}: {e}", ui.amount)))?;
    let decimals = u8::try_from(ui.decimals)
        .map_err(|_| ParseError::Conversion(format!("decimals {} out of range", ui.decimals)))?;
    let owner = if balance.owner.is_empty() { None } else { Some(pubkey_from_str(&balance.owner)?) };

    Ok(TokenBalance {
        account_index: balance.account_index,
        account: key_at(keys, balance.account_index as usize)?,
        mint: pubkey_from_str(&balance.mint)?,
        owner,
        amount_raw,
        decimals,
    })
}

/// 转换为规范化交易
pub fn transaction_from_grpc(
    transaction: &Transaction,
    meta: &TransactionStatusMeta,
    slot: u64,
    block_time: Option<i64>,
) -> Result<SolanaTransaction, ParseError> {
    let msg = transaction.message.as_ref().ok_or(ParseError::MissingField("message"))?;
    let signature_bytes = transaction.signatures.first().ok_or(ParseError::MissingField("signatures"))?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| ParseError::Conversion(format!("invalid signature length {}", signature_bytes.len())))?;

    let account_keys = resolve_account_keys(msg, meta)?;
    let num_signers = msg.header.as_ref().map_or(1, |h| h.num_required_signatures as usize);
    let signers = account_keys.iter().take(num_signers.min(msg.account_keys.len())).copied().collect();

    let instructions = msg
        .instructions
        .iter()
        .map(|ix| resolve_instruction(&account_keys, ix.program_id_index, &ix.accounts, &ix.data))
        .collect::<Result<_, _>>()?;

    let inner_instructions = meta
        .inner_instructions
        .iter()
        .map(|set| {
            Ok(InnerInstructionSet {
                index: set.index,
                instructions: set
                    .instructions
                    .iter()
                    .map(|ix| resolve_instruction(&account_keys, ix.program_id_index, &ix.accounts, &ix.data))
                    .collect::<Result<_, ParseError>>()?,
            })
        })
        .collect::<Result<_, ParseError>>()?;

    let pre_token_balances = meta
        .pre_token_balances
        .iter()
        .map(|b| convert_token_balance(&account_keys, b))
        .collect::<Result<_, _>>()?;
    let post_token_balances = meta
        .post_token_balances
        .iter()
        .map(|b| convert_token_balance(&account_keys, b))
        .collect::<Result<_, _>>()?;

    Ok(SolanaTransaction {
        signature,
        slot,
        block_time,
        account_keys,
        signers,
        instructions,
        inner_instructions,
        pre_balances: meta.pre_balances.clone(),
        post_balances: meta.post_balances.clone(),
        pre_token_balances,
        post_token_balances,
    })
}

/// 转换并建立索引
pub fn adapter_from_grpc(
    transaction: &Transaction,
    meta: &TransactionStatusMeta,
    slot: u64,
    block_time: Option<i64>,
    decimals: MintDecimals,
) -> Result<TransactionAdapter, ParseError> {
    let tx = transaction_from_grpc(transaction, meta, slot, block_time)?;
    Ok(TransactionAdapter::new(tx, decimals))
}
