//! 解析错误类型
//!
//! 指令级错误 [`DecodeError`] 由各协议解码器返回；
//! 交易级错误 [`ParseError`] 附带协议名、签名与指令位置。

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

use crate::core::events::InstructionIndex;
use crate::instr::Protocol;

/// 单条指令解码失败（结构性错误）
///
/// "未匹配" 与 "有意跳过" 不属于错误，解码函数用 `Ok(None)` 表达。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("read out of bounds: needed {needed} bytes, {remaining} remaining")]
    OutOfBounds { needed: usize, remaining: usize },

    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    #[error("missing account at index {index} (instruction has {len})")]
    MissingAccount { index: usize, len: usize },

    #[error("expected at least {expected} correlated transfers, found {found}")]
    MissingTransfer { expected: usize, found: usize },

    #[error("missing balance snapshot for account {account}")]
    MissingBalance { account: Pubkey },

    #[error("unknown decimals for mint {mint}")]
    UnknownDecimals { mint: Pubkey },

    #[error("missing companion instruction `{0}`")]
    MissingInstruction(&'static str),

    #[error("trade input and output share mint {mint}")]
    SameMintTrade { mint: Pubkey },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

/// 交易级解析错误
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{protocol} decode failed at instruction {idx} of {signature}: {source}")]
    Decode {
        protocol: Protocol,
        signature: Signature,
        idx: InstructionIndex,
        #[source]
        source: DecodeError,
    },

    #[error("conversion error: {0}")]
    Conversion(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl ParseError {
    /// 出错的协议（仅解码错误有）
    pub fn protocol(&self) -> Option<Protocol> {
        match self {
            ParseError::Decode { protocol, .. } => Some(*protocol),
            _ => None,
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
