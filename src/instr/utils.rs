//! 指令解析通用工具函数

use solana_sdk::pubkey::Pubkey;

use crate::core::error::{DecodeError, DecodeResult};

/// Anchor `emit_cpi!` 自调用指令前缀（小端序）
pub const EVENT_IX_TAG_LE: [u8; 8] = [228, 69, 165, 46, 81, 203, 154, 29];

/// 是否为 Anchor 自调用事件指令
#[inline(always)]
pub fn is_anchor_event(data: &[u8]) -> bool {
    data.starts_with(&EVENT_IX_TAG_LE)
}

/// 拼接 16 字节事件判别码：CPI 前缀 + 事件标签
pub const fn event_discriminator(tag: [u8; 8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    let mut i = 0;
    while i < 8 {
        out[i] = EVENT_IX_TAG_LE[i];
        out[i + 8] = tag[i];
        i += 1;
    }
    out
}

/// 从账户列表中获取账户，缺失即为结构性错误
#[inline(always)]
pub fn get_account(accounts: &[Pubkey], index: usize) -> DecodeResult<Pubkey> {
    accounts
        .get(index)
        .copied()
        .ok_or(DecodeError::MissingAccount { index, len: accounts.len() })
}

/// 判别码的十六进制形式（日志用）
#[inline]
pub fn discriminator_hex(data: &[u8]) -> String {
    hex::encode(&data[..data.len().min(8)])
}
