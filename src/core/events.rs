//! 规范化事件与交易记录
//!
//! 所有协议解码器都输出同一种 [`MemeEvent`]，交易合成器再从中派生 [`TradeInfo`]。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::core::amount::convert_to_ui_amount;
use crate::instr::program_ids::WSOL_MINT;
use crate::instr::Protocol;

// ============================================================================
// 指令位置
// ============================================================================

/// 指令在执行树中的位置，序列化为 `"outer-inner"`（外层指令只有 `"outer"`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstructionIndex {
    pub outer: u32,
    pub inner: Option<u32>,
}

impl InstructionIndex {
    pub const fn outer(outer: u32) -> Self {
        Self { outer, inner: None }
    }

    pub const fn inner(outer: u32, inner: u32) -> Self {
        Self { outer, inner: Some(inner) }
    }

    /// 排序键：缺失的 inner 视为 0
    #[inline]
    pub fn sort_key(&self) -> (u32, u32) {
        (self.outer, self.inner.unwrap_or(0))
    }
}

impl fmt::Display for InstructionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Some(inner) => write!(f, "{}-{}", self.outer, inner),
            None => write!(f, "{}", self.outer),
        }
    }
}

impl FromStr for InstructionIndex {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((outer, inner)) => Ok(Self::inner(outer.parse()?, inner.parse()?)),
            None => Ok(Self::outer(s.parse()?)),
        }
    }
}

impl Serialize for InstructionIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InstructionIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 原始数量按十进制字符串序列化，避免 JSON 数字精度丢失
mod amount_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// 事件
// ============================================================================

/// 由分发循环统一写入的元数据，解码函数不设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventMetadata {
    pub signature: Signature,
    pub slot: u64,
    /// 区块时间（秒）
    pub block_time: i64,
    pub idx: InstructionIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemeEventType {
    #[default]
    Create,
    Buy,
    Sell,
    Complete,
    Migrate,
    /// 方向需由合成器根据 base mint 推断
    Trade,
}

impl MemeEventType {
    #[inline]
    pub fn is_trade(&self) -> bool {
        matches!(self, MemeEventType::Buy | MemeEventType::Sell | MemeEventType::Trade)
    }
}

/// 事件内的代币数量
///
/// `ui_amount` 存在时视为完整可信（来自链上日志或已带精度的转账）；
/// 否则由合成器通过 mint 精度查询补全，`decimals` 仅作为查询失败时的默认值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub mint: Pubkey,
    #[serde(with = "amount_str")]
    pub amount_raw: u128,
    pub decimals: Option<u8>,
    pub ui_amount: Option<f64>,
}

impl TokenAmount {
    /// 精度未知
    pub fn raw(mint: Pubkey, amount_raw: impl Into<u128>) -> Self {
        Self { mint, amount_raw: amount_raw.into(), decimals: None, ui_amount: None }
    }

    /// 精度确定，直接计算 UI 数量
    pub fn with_decimals(mint: Pubkey, amount_raw: impl Into<u128>, decimals: u8) -> Self {
        let amount_raw = amount_raw.into();
        Self {
            mint,
            amount_raw,
            decimals: Some(decimals),
            ui_amount: Some(convert_to_ui_amount(amount_raw, decimals)),
        }
    }

    /// 默认精度，可被 mint 精度查询覆盖
    pub fn hinted(mint: Pubkey, amount_raw: impl Into<u128>, default_decimals: u8) -> Self {
        Self { mint, amount_raw: amount_raw.into(), decimals: Some(default_decimals), ui_amount: None }
    }

    /// 原生 SOL（按 WSOL mint 记录）
    pub fn sol(lamports: impl Into<u128>) -> Self {
        Self::with_decimals(WSOL_MINT, lamports, 9)
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.decimals.is_some() && self.ui_amount.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Protocol,
    Platform,
    Creator,
    Share,
    Dex,
    Helio,
    Lp,
    Trade,
}

/// 协议上报的单项费用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeComponent {
    pub fee_type: FeeType,
    pub mint: Pubkey,
    #[serde(with = "amount_str")]
    pub amount_raw: u128,
    pub recipient: Option<Pubkey>,
}

impl FeeComponent {
    pub fn new(fee_type: FeeType, mint: Pubkey, amount_raw: impl Into<u128>) -> Self {
        Self { fee_type, mint, amount_raw: amount_raw.into(), recipient: None }
    }

    pub fn with_recipient(mut self, recipient: Pubkey) -> Self {
        self.recipient = Some(recipient);
        self
    }
}

/// 规范化事件（CREATE / BUY / SELL / COMPLETE / MIGRATE / TRADE）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemeEvent {
    pub metadata: EventMetadata,
    pub protocol: Protocol,
    pub event_type: MemeEventType,
    pub program_id: Pubkey,
    pub base_mint: Option<Pubkey>,
    pub quote_mint: Option<Pubkey>,
    pub user: Option<Pubkey>,
    pub pool: Option<Pubkey>,
    pub bonding_curve: Option<Pubkey>,
    pub input_token: Option<TokenAmount>,
    pub output_token: Option<TokenAmount>,
    pub fees: Vec<FeeComponent>,
    pub creator: Option<Pubkey>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub uri: Option<String>,
}

// ============================================================================
// 交易
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

/// 精度已解析的代币数量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub mint: Pubkey,
    #[serde(with = "amount_str")]
    pub amount_raw: u128,
    pub ui_amount: f64,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(mint: Pubkey, amount_raw: u128, decimals: u8) -> Self {
        Self { mint, amount_raw, ui_amount: convert_to_ui_amount(amount_raw, decimals), decimals }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeInfo {
    pub fee_type: FeeType,
    pub mint: Pubkey,
    #[serde(with = "amount_str")]
    pub amount_raw: u128,
    pub ui_amount: f64,
    pub decimals: u8,
    pub recipient: Option<Pubkey>,
}

/// 调用来源（聚合器 / 路由），缺省为解码协议自身
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DexInfo {
    pub program_id: Option<Pubkey>,
    pub amm: Option<String>,
    pub route: Option<String>,
}

/// 规范化交易记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInfo {
    pub metadata: EventMetadata,
    pub trade_type: TradeType,
    pub protocol: Protocol,
    pub pools: Vec<Pubkey>,
    pub input_token: TokenInfo,
    pub output_token: TokenInfo,
    /// quote 侧费用合计
    pub fee: Option<TokenInfo>,
    pub fees: Vec<FeeInfo>,
    pub user: Pubkey,
    pub program_id: Pubkey,
    pub amm: String,
    pub route: String,
}

/// 一笔交易的解析结果，`events` 与 `trades` 均按 idx 排序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParseResult {
    pub signature: Signature,
    pub slot: u64,
    pub timestamp: i64,
    pub signer: Pubkey,
    pub events: Vec<MemeEvent>,
    pub trades: Vec<TradeInfo>,
}
