// 核心模块 - 扁平化结构
pub mod core;
pub mod instr; // 指令解析器

// gRPC 模块 - Yellowstone 交易转换
pub mod grpc;

// RPC 解析模块 - 支持直接从RPC解析交易
pub mod rpc_parser;

// 重新导出主要API - 单一入口解析器
pub use core::{
    // 交易视图与精度缓存
    DecimalsCache, MintDecimals, SolanaTransaction, TransactionAdapter,
    // 事件类型
    DexInfo, EventMetadata, FeeComponent, FeeInfo, FeeType, InstructionIndex, MemeEvent, MemeEventType,
    ParseResult, TokenAmount, TokenInfo, TradeInfo, TradeType,
    // 解析器与配置
    DexParser, EventListener, EventTypeFilter, ParseConfig,
    // 错误
    DecodeError, ParseError,
};
pub use instr::Protocol;

// 导出 gRPC / RPC 转换函数
pub use grpc::{adapter_from_grpc, transaction_from_grpc};
pub use rpc_parser::{adapter_from_rpc, convert_rpc_to_grpc, parse_rpc_transaction};
