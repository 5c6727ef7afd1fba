//! 统一解析器 - 单一入口
//!
//! 一笔交易的处理流程：
//! 1. 分类所有外层与内层指令
//! 2. 关联转账
//! 3. 对每条已知协议的指令按静态分发表解码
//! 4. 过滤、合成交易、按 idx 稳定排序
//!
//! 单条指令的结构性错误使整笔交易失败；批量解析中失败的交易被记录并排除，不影响其他交易。

use rayon::prelude::*;

use crate::core::adapter::TransactionAdapter;
use crate::core::classifier::InstructionClassifier;
use crate::core::config::ParseConfig;
use crate::core::error::ParseError;
use crate::core::events::{DexInfo, MemeEvent, ParseResult, TradeInfo};
use crate::core::trade::TradeSynthesizer;
use crate::core::transfers::TransferCorrelator;
use crate::instr::{DecodeContext, Protocol};

/// 无状态解析器，可在线程间共享
#[derive(Debug, Clone, Copy, Default)]
pub struct DexParser;

impl DexParser {
    pub fn new() -> Self {
        Self
    }

    /// 解析一笔交易
    ///
    /// `dex_info` 描述外层调用来源（聚合器 / 路由），缺省时交易记录使用协议自身名称。
    pub fn parse(
        &self,
        adapter: &TransactionAdapter,
        config: &ParseConfig,
        dex_info: Option<&DexInfo>,
    ) -> Result<ParseResult, ParseError> {
        let classifier = InstructionClassifier::new(adapter);
        let correlator = if config.extra_transfer_kinds.is_empty() {
            TransferCorrelator::default()
        } else {
            TransferCorrelator::with_extra_kinds(&config.extra_transfer_kinds)
        };
        let transfers = correlator.correlate(adapter);

        let mut events: Vec<MemeEvent> = Vec::new();
        for ci in classifier.all() {
            let Some(protocol) = Protocol::from_program_id(&ci.program_id) else {
                continue;
            };
            if !config.should_parse_program(&ci.program_id) {
                continue;
            }

            let ctx = DecodeContext {
                protocol,
                instruction: *ci,
                adapter,
                classifier: &classifier,
                transfers: &transfers,
            };
            match protocol.try_decode(&ctx) {
                Ok(Some(event)) if config.should_include(event.event_type) => events.push(event),
                Ok(_) => {}
                Err(source) => {
                    return Err(ParseError::Decode {
                        protocol,
                        signature: adapter.signature(),
                        idx: ci.idx(),
                        source,
                    })
                }
            }
        }
        events.sort_by_key(|e| e.metadata.idx.sort_key());

        let trades = if config.emit_trades {
            self.synthesize_trades(adapter, &events, dex_info)?
        } else {
            Vec::new()
        };

        log::debug!(
            "{}: {} events, {} trades, {} transfer groups",
            adapter.signature(),
            events.len(),
            trades.len(),
            transfers.len()
        );

        Ok(ParseResult {
            signature: adapter.signature(),
            slot: adapter.slot(),
            timestamp: adapter.block_time(),
            signer: adapter.signer(),
            events,
            trades,
        })
    }

    fn synthesize_trades(
        &self,
        adapter: &TransactionAdapter,
        events: &[MemeEvent],
        dex_info: Option<&DexInfo>,
    ) -> Result<Vec<TradeInfo>, ParseError> {
        let default_info = DexInfo::default();
        let synthesizer = TradeSynthesizer::new(adapter, dex_info.unwrap_or(&default_info));

        let mut trades = Vec::new();
        for event in events {
            match synthesizer.synthesize(event) {
                Ok(Some(trade)) => trades.push(trade),
                Ok(None) => {}
                Err(source) => {
                    return Err(ParseError::Decode {
                        protocol: event.protocol,
                        signature: adapter.signature(),
                        idx: event.metadata.idx,
                        source,
                    })
                }
            }
        }
        Ok(trades)
    }

    /// 并行解析，每笔交易独立；结果与输入顺序一致
    pub fn parse_batch_results(
        &self,
        adapters: &[TransactionAdapter],
        config: &ParseConfig,
        dex_info: Option<&DexInfo>,
    ) -> Vec<Result<ParseResult, ParseError>> {
        adapters.par_iter().map(|adapter| self.parse(adapter, config, dex_info)).collect()
    }

    /// 并行解析，失败的交易记录日志后排除
    pub fn parse_batch(
        &self,
        adapters: &[TransactionAdapter],
        config: &ParseConfig,
        dex_info: Option<&DexInfo>,
    ) -> Vec<ParseResult> {
        self.parse_batch_results(adapters, config, dex_info)
            .into_iter()
            .filter_map(|result| match result {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    log::warn!("skipping transaction: {err}");
                    None
                }
            })
            .collect()
    }

    /// 解析并逐个回调
    pub fn parse_with_listener<T: EventListener>(
        &self,
        adapter: &TransactionAdapter,
        config: &ParseConfig,
        listener: &mut T,
    ) -> Result<(), ParseError> {
        let result = self.parse(adapter, config, None)?;
        for event in &result.events {
            listener.on_meme_event(event);
        }
        for trade in &result.trades {
            listener.on_trade(trade);
        }
        Ok(())
    }
}

/// 事件监听器 - 调用方实现此 trait 接收解析结果
pub trait EventListener {
    fn on_meme_event(&mut self, event: &MemeEvent);

    fn on_trade(&mut self, _trade: &TradeInfo) {}
}
