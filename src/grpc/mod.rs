//! gRPC 模块 - Yellowstone 交易到规范化视图的转换

pub mod convert;

pub use convert::{adapter_from_grpc, transaction_from_grpc};
