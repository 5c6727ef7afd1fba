//! 转账关联
//!
//! 遍历每条外层指令的 CPI 列表，把 token / 原生 SOL 转账归到触发它的那条指令下，
//! 键为 `programId:outer[-inner]`。一条指令没有引起任何转账时，查询返回空切片。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use solana_sdk::pubkey::Pubkey;
use spl_token::instruction::TokenInstruction;

use crate::core::adapter::{Instruction, TransactionAdapter};
use crate::core::amount::convert_to_ui_amount;
use crate::core::events::{InstructionIndex, TokenAmount};
use crate::instr::program_ids::{
    is_token_program, ASSOCIATED_TOKEN_PROGRAM_ID, COMPUTE_BUDGET_PROGRAM_ID, NATIVE_SOL_DECIMALS,
    SYSTEM_PROGRAM_ID, WSOL_MINT,
};
use crate::instr::utils::is_anchor_event;

/// System Program `Transfer` 指令标签（u32 LE）
const SYSTEM_TRANSFER_TAG: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferKind {
    Transfer,
    TransferChecked,
    MintTo,
    MintToChecked,
    Burn,
    BurnChecked,
    /// System Program 原生 SOL 转账
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub kind: TransferKind,
    pub program_id: Pubkey,
    pub mint: Pubkey,
    /// mint-to 时为 mint 地址
    pub source: Pubkey,
    /// burn 时为 mint 地址
    pub destination: Pubkey,
    pub source_owner: Option<Pubkey>,
    pub destination_owner: Option<Pubkey>,
    pub authority: Option<Pubkey>,
    pub amount_raw: u128,
    pub decimals: u8,
    pub ui_amount: f64,
    pub idx: InstructionIndex,
}

impl TransferRecord {
    #[inline]
    pub fn token_amount(&self) -> TokenAmount {
        TokenAmount::with_decimals(self.mint, self.amount_raw, self.decimals)
    }

    #[inline]
    pub fn is_sol(&self) -> bool {
        self.mint == WSOL_MINT
    }
}

/// `programId:outer[-inner]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferKey {
    pub program_id: Pubkey,
    pub idx: InstructionIndex,
}

impl fmt::Display for TransferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.program_id, self.idx)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferMap {
    groups: HashMap<TransferKey, SmallVec<[TransferRecord; 2]>>,
}

impl TransferMap {
    /// 某条指令引起的转账（执行顺序）
    pub fn get(&self, program_id: &Pubkey, idx: InstructionIndex) -> &[TransferRecord] {
        self.groups
            .get(&TransferKey { program_id: *program_id, idx })
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &TransferKey> {
        self.groups.keys()
    }

    /// 所有分组中的转账总数
    pub fn len(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn push(&mut self, key: TransferKey, record: TransferRecord) {
        self.groups.entry(key).or_default().push(record);
    }
}

/// 转账关联器；默认只收集 Transfer / TransferChecked / 原生转账
#[derive(Debug, Clone)]
pub struct TransferCorrelator {
    kinds: SmallVec<[TransferKind; 8]>,
}

impl Default for TransferCorrelator {
    fn default() -> Self {
        Self {
            kinds: SmallVec::from_slice(&[
                TransferKind::Transfer,
                TransferKind::TransferChecked,
                TransferKind::Native,
            ]),
        }
    }
}

impl TransferCorrelator {
    /// 在默认种类之外追加（如 MintTo / Burn）
    pub fn with_extra_kinds(extra: &[TransferKind]) -> Self {
        let mut correlator = Self::default();
        for kind in extra {
            if !correlator.kinds.contains(kind) {
                correlator.kinds.push(*kind);
            }
        }
        correlator
    }

    #[inline]
    pub fn accepts(&self, kind: TransferKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn correlate(&self, adapter: &TransactionAdapter) -> TransferMap {
        let mut map = TransferMap::default();

        for (outer, outer_ix) in adapter.instructions().iter().enumerate() {
            let outer = outer as u32;
            let outer_idx = InstructionIndex::outer(outer);

            if let Some(record) = self.decode_transfer(adapter, outer_ix, outer_idx) {
                map.push(TransferKey { program_id: outer_ix.program_id, idx: outer_idx }, record);
            }

            let mut current = TransferKey { program_id: outer_ix.program_id, idx: outer_idx };
            for (inner, ix) in adapter.inner_instructions_of(outer).iter().enumerate() {
                let idx = InstructionIndex::inner(outer, inner as u32);
                if is_passthrough_program(&ix.program_id) {
                    if let Some(record) = self.decode_transfer(adapter, ix, idx) {
                        map.push(current, record);
                    }
                } else if !is_anchor_event(&ix.data) {
                    current = TransferKey { program_id: ix.program_id, idx };
                }
            }
        }

        log::trace!("correlated {} transfers for {}", map.len(), adapter.signature());
        map
    }

    fn decode_transfer(
        &self,
        adapter: &TransactionAdapter,
        ix: &Instruction,
        idx: InstructionIndex,
    ) -> Option<TransferRecord> {
        if ix.program_id == SYSTEM_PROGRAM_ID {
            return self.decode_native(ix, idx);
        }
        if !is_token_program(&ix.program_id) {
            return None;
        }

        let accounts = &ix.accounts;
        let (kind, amount, checked_decimals, source, mint_hint, destination, authority) =
            match TokenInstruction::unpack(&ix.data).ok()? {
                TokenInstruction::Transfer { amount } => {
                    (TransferKind::Transfer, amount, None, *accounts.first()?, None, *accounts.get(1)?, accounts.get(2))
                }
                TokenInstruction::TransferChecked { amount, decimals } => (
                    TransferKind::TransferChecked,
                    amount,
                    Some(decimals),
                    *accounts.first()?,
                    accounts.get(1).copied(),
                    *accounts.get(2)?,
                    accounts.get(3),
                ),
                TokenInstruction::MintTo { amount } => {
                    let mint = *accounts.first()?;
                    (TransferKind::MintTo, amount, None, mint, Some(mint), *accounts.get(1)?, accounts.get(2))
                }
                TokenInstruction::MintToChecked { amount, decimals } => {
                    let mint = *accounts.first()?;
                    (TransferKind::MintToChecked, amount, Some(decimals), mint, Some(mint), *accounts.get(1)?, accounts.get(2))
                }
                TokenInstruction::Burn { amount } => {
                    let mint = *accounts.get(1)?;
                    (TransferKind::Burn, amount, None, *accounts.first()?, Some(mint), mint, accounts.get(2))
                }
                TokenInstruction::BurnChecked { amount, decimals } => {
                    let mint = *accounts.get(1)?;
                    (TransferKind::BurnChecked, amount, Some(decimals), *accounts.first()?, Some(mint), mint, accounts.get(2))
                }
                _ => return None,
            };

        if !self.accepts(kind) {
            return None;
        }

        let source_info = adapter.token_account_info(&source);
        let destination_info = adapter.token_account_info(&destination);
        // mint 无法确定的转账直接丢弃
        let mint = mint_hint
            .or_else(|| source_info.map(|i| i.mint))
            .or_else(|| destination_info.map(|i| i.mint))?;
        let decimals = checked_decimals
            .or_else(|| source_info.map(|i| i.decimals))
            .or_else(|| destination_info.map(|i| i.decimals))
            .or_else(|| adapter.mint_decimals(&mint).ok())?;

        let source_owner = source_info.and_then(|i| i.owner).or_else(|| match kind {
            TransferKind::Transfer | TransferKind::TransferChecked => authority.copied(),
            _ => None,
        });

        Some(TransferRecord {
            kind,
            program_id: ix.program_id,
            mint,
            source,
            destination,
            source_owner,
            destination_owner: destination_info.and_then(|i| i.owner),
            authority: authority.copied(),
            amount_raw: amount as u128,
            decimals,
            ui_amount: convert_to_ui_amount(amount as u128, decimals),
            idx,
        })
    }

    fn decode_native(&self, ix: &Instruction, idx: InstructionIndex) -> Option<TransferRecord> {
        if !self.accepts(TransferKind::Native) || ix.data.len() < 12 {
            return None;
        }
        let tag = u32::from_le_bytes(ix.data[0..4].try_into().ok()?);
        if tag != SYSTEM_TRANSFER_TAG {
            return None;
        }
        let lamports = u64::from_le_bytes(ix.data[4..12].try_into().ok()?);
        let source = *ix.accounts.first()?;
        let destination = *ix.accounts.get(1)?;
        Some(TransferRecord {
            kind: TransferKind::Native,
            program_id: SYSTEM_PROGRAM_ID,
            mint: WSOL_MINT,
            source,
            destination,
            source_owner: Some(source),
            destination_owner: Some(destination),
            authority: Some(source),
            amount_raw: lamports as u128,
            decimals: NATIVE_SOL_DECIMALS,
            ui_amount: convert_to_ui_amount(lamports as u128, NATIVE_SOL_DECIMALS),
            idx,
        })
    }
}

/// 不改变归属分组的程序：token、system、ATA、compute budget
#[inline]
fn is_passthrough_program(program_id: &Pubkey) -> bool {
    is_token_program(program_id)
        || *program_id == SYSTEM_PROGRAM_ID
        || *program_id == ASSOCIATED_TOKEN_PROGRAM_ID
        || *program_id == COMPUTE_BUDGET_PROGRAM_ID
}
