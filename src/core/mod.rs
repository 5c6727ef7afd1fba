//! Solana meme / DEX 事件解析器核心模块
//!
//! 提供纯函数式的解析能力：
//! - 规范化交易视图与指令分类
//! - 转账关联（按发起指令分组）
//! - 精度解析与交易合成
//! - 统一的事件格式，按指令位置排序

pub mod adapter;        // 规范化交易视图
pub mod amount;         // 精确的 UI 数量换算
pub mod cache;          // mint 精度缓存
pub mod classifier;     // 指令分类
pub mod config;         // 解析配置
pub mod error;          // 错误类型
pub mod events;         // 事件定义
pub mod reader;         // 二进制读取器
pub mod trade;          // 交易合成
pub mod transfers;      // 转账关联
pub mod unified_parser; // 统一解析器 - 单一入口

// 主要导出
pub use adapter::{SolanaTransaction, TransactionAdapter};
pub use cache::{DecimalsCache, MintDecimals};
pub use config::{EventTypeFilter, ParseConfig};
pub use error::{DecodeError, DecodeResult, ParseError};
pub use events::*;
pub use unified_parser::{DexParser, EventListener};
