//! 规范化交易视图
//!
//! gRPC 与 RPC 两种来源都先转换成 [`SolanaTransaction`]，
//! [`TransactionAdapter`] 在其上建立一次索引，供分类器、转账关联与各协议解码器只读访问。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::core::cache::MintDecimals;
use crate::core::error::{DecodeError, DecodeResult};
use crate::instr::program_ids::{NATIVE_SOL_DECIMALS, WSOL_MINT};

/// 账户已解析的指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

/// 某条外层指令触发的 CPI 列表（执行顺序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InnerInstructionSet {
    pub index: u32,
    pub instructions: Vec<Instruction>,
}

/// SPL token 账户余额快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account_index: u32,
    pub account: Pubkey,
    pub mint: Pubkey,
    pub owner: Option<Pubkey>,
    pub amount_raw: u128,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SolanaTransaction {
    pub signature: Signature,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// 静态账户 + ALT 可写 + ALT 只读
    pub account_keys: Vec<Pubkey>,
    pub signers: Vec<Pubkey>,
    pub instructions: Vec<Instruction>,
    pub inner_instructions: Vec<InnerInstructionSet>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

/// token 账户的 mint / owner / 精度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub mint: Pubkey,
    pub owner: Option<Pubkey>,
    pub decimals: u8,
}

/// 带索引的只读交易视图
#[derive(Debug, Clone)]
pub struct TransactionAdapter {
    tx: SolanaTransaction,
    decimals: MintDecimals,
    account_positions: HashMap<Pubkey, usize>,
    inner_positions: HashMap<u32, usize>,
    pre_token: HashMap<Pubkey, usize>,
    post_token: HashMap<Pubkey, usize>,
    local_decimals: HashMap<Pubkey, u8>,
}

impl TransactionAdapter {
    pub fn new(tx: SolanaTransaction, decimals: MintDecimals) -> Self {
        let mut account_positions = HashMap::with_capacity(tx.account_keys.len());
        for (i, key) in tx.account_keys.iter().enumerate() {
            account_positions.entry(*key).or_insert(i);
        }
        let inner_positions =
            tx.inner_instructions.iter().enumerate().map(|(i, set)| (set.index, i)).collect();
        let pre_token = tx.pre_token_balances.iter().enumerate().map(|(i, b)| (b.account, i)).collect();
        let post_token = tx.post_token_balances.iter().enumerate().map(|(i, b)| (b.account, i)).collect();
        let local_decimals = tx
            .pre_token_balances
            .iter()
            .chain(tx.post_token_balances.iter())
            .map(|b| (b.mint, b.decimals))
            .collect();

        Self { tx, decimals, account_positions, inner_positions, pre_token, post_token, local_decimals }
    }

    #[inline]
    pub fn transaction(&self) -> &SolanaTransaction {
        &self.tx
    }

    #[inline]
    pub fn signature(&self) -> Signature {
        self.tx.signature
    }

    #[inline]
    pub fn slot(&self) -> u64 {
        self.tx.slot
    }

    #[inline]
    pub fn block_time(&self) -> i64 {
        self.tx.block_time.unwrap_or(0)
    }

    /// 手续费支付者（第一个签名者）
    #[inline]
    pub fn signer(&self) -> Pubkey {
        self.tx
            .signers
            .first()
            .or_else(|| self.tx.account_keys.first())
            .copied()
            .unwrap_or_default()
    }

    pub fn is_signer(&self, key: &Pubkey) -> bool {
        self.tx.signers.contains(key)
    }

    #[inline]
    pub fn instructions(&self) -> &[Instruction] {
        &self.tx.instructions
    }

    /// 某外层指令的内层指令（无 CPI 时为空）
    pub fn inner_instructions_of(&self, outer: u32) -> &[Instruction] {
        self.inner_positions
            .get(&outer)
            .map(|&i| self.tx.inner_instructions[i].instructions.as_slice())
            .unwrap_or(&[])
    }

    pub fn instruction_at(&self, outer: u32, inner: Option<u32>) -> Option<&Instruction> {
        match inner {
            None => self.tx.instructions.get(outer as usize),
            Some(inner) => self.inner_instructions_of(outer).get(inner as usize),
        }
    }

    #[inline]
    pub fn accounts_of<'a>(&self, instruction: &'a Instruction) -> &'a [Pubkey] {
        &instruction.accounts
    }

    fn account_position(&self, account: &Pubkey) -> Option<usize> {
        self.account_positions.get(account).copied()
    }

    pub fn pre_balance(&self, account: &Pubkey) -> Option<u64> {
        self.account_position(account).and_then(|i| self.tx.pre_balances.get(i).copied())
    }

    pub fn post_balance(&self, account: &Pubkey) -> Option<u64> {
        self.account_position(account).and_then(|i| self.tx.post_balances.get(i).copied())
    }

    /// lamports 变化（post - pre）
    pub fn balance_change(&self, account: &Pubkey) -> Option<i128> {
        Some(self.post_balance(account)? as i128 - self.pre_balance(account)? as i128)
    }

    pub fn pre_token_balance(&self, account: &Pubkey) -> Option<&TokenBalance> {
        self.pre_token.get(account).map(|&i| &self.tx.pre_token_balances[i])
    }

    pub fn post_token_balance(&self, account: &Pubkey) -> Option<&TokenBalance> {
        self.post_token.get(account).map(|&i| &self.tx.post_token_balances[i])
    }

    /// token 余额变化；账户新建或关闭时缺失的一侧按 0 计
    pub fn token_balance_change(&self, account: &Pubkey) -> Option<i128> {
        let pre = self.pre_token_balance(account);
        let post = self.post_token_balance(account);
        if pre.is_none() && post.is_none() {
            return None;
        }
        let pre = pre.map(|b| b.amount_raw as i128).unwrap_or(0);
        let post = post.map(|b| b.amount_raw as i128).unwrap_or(0);
        Some(post - pre)
    }

    pub fn token_account_info(&self, account: &Pubkey) -> Option<TokenAccountInfo> {
        self.post_token_balance(account)
            .or_else(|| self.pre_token_balance(account))
            .map(|b| TokenAccountInfo { mint: b.mint, owner: b.owner, decimals: b.decimals })
    }

    /// 交易内余额优先，其次进程级快照；原生 SOL 恒为 9
    pub fn mint_decimals(&self, mint: &Pubkey) -> DecodeResult<u8> {
        if *mint == WSOL_MINT {
            return Ok(NATIVE_SOL_DECIMALS);
        }
        self.local_decimals
            .get(mint)
            .copied()
            .or_else(|| self.decimals.get(mint))
            .ok_or(DecodeError::UnknownDecimals { mint: *mint })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! 测试用交易构造器

    use super::*;

    pub fn unique_signature() -> Signature {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(Pubkey::new_unique().as_ref());
        Signature::from(bytes)
    }

    pub struct TxBuilder {
        pub tx: SolanaTransaction,
    }

    impl TxBuilder {
        pub fn new(signer: Pubkey) -> Self {
            Self {
                tx: SolanaTransaction {
                    signature: unique_signature(),
                    slot: 100,
                    block_time: Some(1_700_000_000),
                    account_keys: vec![signer],
                    signers: vec![signer],
                    ..Default::default()
                },
            }
        }

        pub fn instruction(mut self, program_id: Pubkey, accounts: Vec<Pubkey>, data: Vec<u8>) -> Self {
            self.tx.instructions.push(Instruction { program_id, accounts, data });
            self
        }

        pub fn inner(mut self, outer: u32, program_id: Pubkey, accounts: Vec<Pubkey>, data: Vec<u8>) -> Self {
            let ix = Instruction { program_id, accounts, data };
            match self.tx.inner_instructions.iter_mut().find(|s| s.index == outer) {
                Some(set) => set.instructions.push(ix),
                None => self
                    .tx
                    .inner_instructions
                    .push(InnerInstructionSet { index: outer, instructions: vec![ix] }),
            }
            self
        }

        fn key_index(&mut self, account: Pubkey) -> usize {
            match self.tx.account_keys.iter().position(|k| *k == account) {
                Some(i) => i,
                None => {
                    self.tx.account_keys.push(account);
                    self.tx.account_keys.len() - 1
                }
            }
        }

        pub fn lamports(mut self, account: Pubkey, pre: u64, post: u64) -> Self {
            let i = self.key_index(account);
            if self.tx.pre_balances.len() <= i {
                self.tx.pre_balances.resize(i + 1, 0);
                self.tx.post_balances.resize(i + 1, 0);
            }
            self.tx.pre_balances[i] = pre;
            self.tx.post_balances[i] = post;
            self
        }

        pub fn token_account(
            mut self,
            account: Pubkey,
            mint: Pubkey,
            owner: Pubkey,
            decimals: u8,
            pre: u128,
            post: u128,
        ) -> Self {
            let account_index = self.key_index(account) as u32;
            let balance = |amount_raw| TokenBalance {
                account_index,
                account,
                mint,
                owner: Some(owner),
                amount_raw,
                decimals,
            };
            self.tx.pre_token_balances.push(balance(pre));
            self.tx.post_token_balances.push(balance(post));
            self
        }

        pub fn build(self) -> TransactionAdapter {
            TransactionAdapter::new(self.tx, MintDecimals::default())
        }

        pub fn build_with(self, decimals: MintDecimals) -> TransactionAdapter {
            TransactionAdapter::new(self.tx, decimals)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::TxBuilder;
    use super::*;

    #[test]
    fn test_inner_instructions_and_lookup() {
        let signer = Pubkey::new_unique();
        let program = Pubkey::new_unique();
        let adapter = TxBuilder::new(signer)
            .instruction(program, vec![signer], vec![1])
            .instruction(program, vec![], vec![2])
            .inner(1, program, vec![], vec![3])
            .build();

        assert_eq!(adapter.signer(), signer);
        assert!(adapter.inner_instructions_of(0).is_empty());
        assert_eq!(adapter.inner_instructions_of(1).len(), 1);
        assert_eq!(adapter.instruction_at(1, Some(0)).unwrap().data, vec![3]);
        assert_eq!(adapter.instruction_at(0, None).unwrap().data, vec![1]);
        assert!(adapter.instruction_at(5, None).is_none());
    }

    #[test]
    fn test_balance_changes() {
        let signer = Pubkey::new_unique();
        let vault = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let adapter = TxBuilder::new(signer)
            .lamports(signer, 5_000, 1_000)
            .token_account(vault, mint, signer, 6, 100, 40)
            .build();

        assert_eq!(adapter.balance_change(&signer), Some(-4_000));
        assert_eq!(adapter.token_balance_change(&vault), Some(-60));
        assert_eq!(adapter.token_balance_change(&Pubkey::new_unique()), None);
        assert_eq!(adapter.token_account_info(&vault).unwrap().mint, mint);
    }

    #[test]
    fn test_mint_decimals_resolution_order() {
        let signer = Pubkey::new_unique();
        let local = Pubkey::new_unique();
        let cached = Pubkey::new_unique();
        let unknown = Pubkey::new_unique();
        let snapshot: MintDecimals = [(cached, 8), (local, 2)].into_iter().collect();
        let adapter = TxBuilder::new(signer)
            .token_account(Pubkey::new_unique(), local, signer, 6, 0, 1)
            .build_with(snapshot);

        assert_eq!(adapter.mint_decimals(&WSOL_MINT), Ok(9));
        assert_eq!(adapter.mint_decimals(&local), Ok(6));
        assert_eq!(adapter.mint_decimals(&cached), Ok(8));
        assert_eq!(
            adapter.mint_decimals(&unknown),
            Err(DecodeError::UnknownDecimals { mint: unknown })
        );
    }
}
