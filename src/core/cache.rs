//! # Mint 精度缓存
//!
//! 进程级缓存由调用方持有；每次解码拿到一个不可变快照 [`MintDecimals`]，
//! 同一笔交易在解码期间不会看到两种不同的精度。
//!
//! ```rust
//! use sol_meme_parser::core::cache::DecimalsCache;
//! use solana_sdk::pubkey::Pubkey;
//!
//! let cache = DecimalsCache::new();
//! let mint = Pubkey::new_unique();
//! let before = cache.snapshot();
//! cache.insert(mint, 6);
//! assert_eq!(before.get(&mint), None);
//! assert_eq!(cache.snapshot().get(&mint), Some(6));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use solana_sdk::pubkey::Pubkey;

use crate::core::adapter::SolanaTransaction;

/// 精度快照（copy-on-write，克隆只增加引用计数）
#[derive(Debug, Clone, Default)]
pub struct MintDecimals(Arc<HashMap<Pubkey, u8>>);

impl MintDecimals {
    pub fn new(map: HashMap<Pubkey, u8>) -> Self {
        Self(Arc::new(map))
    }

    #[inline]
    pub fn get(&self, mint: &Pubkey) -> Option<u8> {
        self.0.get(mint).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Pubkey, u8)> for MintDecimals {
    fn from_iter<I: IntoIterator<Item = (Pubkey, u8)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// 可并发刷新的精度缓存
#[derive(Debug, Default)]
pub struct DecimalsCache {
    current: RwLock<Arc<HashMap<Pubkey, u8>>>,
}

impl DecimalsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前版本的只读快照
    #[inline]
    pub fn snapshot(&self) -> MintDecimals {
        MintDecimals(Arc::clone(&self.current.read()))
    }

    pub fn insert(&self, mint: Pubkey, decimals: u8) {
        self.extend(std::iter::once((mint, decimals)));
    }

    /// 批量写入；值未变化时不产生新版本
    pub fn extend<I: IntoIterator<Item = (Pubkey, u8)>>(&self, entries: I) {
        let mut guard = self.current.write();
        let mut next: Option<HashMap<Pubkey, u8>> = None;
        for (mint, decimals) in entries {
            let existing = next.as_ref().unwrap_or(&**guard).get(&mint).copied();
            if existing == Some(decimals) {
                continue;
            }
            next.get_or_insert_with(|| (**guard).clone()).insert(mint, decimals);
        }
        if let Some(map) = next {
            *guard = Arc::new(map);
        }
    }

    /// 从交易的 token 余额快照中学习精度
    pub fn observe(&self, tx: &SolanaTransaction) {
        let entries = tx
            .pre_token_balances
            .iter()
            .chain(tx.post_token_balances.iter())
            .map(|b| (b.mint, b.decimals))
            .collect::<Vec<_>>();
        self.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}
