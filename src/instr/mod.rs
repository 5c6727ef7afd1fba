//! 指令解析器模块
//!
//! 每个协议一个模块，各自持有一张静态分发表 `&'static [EventRoute]`。
//! [`Protocol`] 是封闭的协议集合，分发在编译期穷举。

pub mod boopfun;
pub mod meteora_dbc;
pub mod meteora_pools;
pub mod moonit;
pub mod program_ids;
pub mod pumpfun;
pub mod raydium_launchpad;
pub mod sugar;
pub mod utils;

use std::fmt;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::core::adapter::TransactionAdapter;
use crate::core::classifier::{ClassifiedInstruction, InstructionClassifier};
use crate::core::error::{DecodeError, DecodeResult};
use crate::core::events::{EventMetadata, InstructionIndex, MemeEvent, MemeEventType};
use crate::core::reader::BinaryReader;
use crate::core::transfers::{TransferMap, TransferRecord};
use program_ids::*;
use utils::{discriminator_hex, get_account};

// ============================================================================
// 协议
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Protocol {
    #[default]
    Pumpfun,
    Boopfun,
    MeteoraDbc,
    MeteoraDlmm,
    MeteoraDamm,
    MeteoraDammV2,
    Moonit,
    RaydiumLaunchpad,
    Sugar,
}

impl Protocol {
    pub const ALL: [Protocol; 9] = [
        Protocol::Pumpfun,
        Protocol::Boopfun,
        Protocol::MeteoraDbc,
        Protocol::MeteoraDlmm,
        Protocol::MeteoraDamm,
        Protocol::MeteoraDammV2,
        Protocol::Moonit,
        Protocol::RaydiumLaunchpad,
        Protocol::Sugar,
    ];

    #[inline]
    pub fn from_program_id(program_id: &Pubkey) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.program_id() == *program_id)
    }

    pub const fn program_id(&self) -> Pubkey {
        match self {
            Protocol::Pumpfun => PUMPFUN_PROGRAM_ID,
            Protocol::Boopfun => BOOPFUN_PROGRAM_ID,
            Protocol::MeteoraDbc => METEORA_DBC_PROGRAM_ID,
            Protocol::MeteoraDlmm => METEORA_DLMM_PROGRAM_ID,
            Protocol::MeteoraDamm => METEORA_POOLS_PROGRAM_ID,
            Protocol::MeteoraDammV2 => METEORA_DAMM_V2_PROGRAM_ID,
            Protocol::Moonit => MOONIT_PROGRAM_ID,
            Protocol::RaydiumLaunchpad => RAYDIUM_LAUNCHPAD_PROGRAM_ID,
            Protocol::Sugar => SUGAR_PROGRAM_ID,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Protocol::Pumpfun => "Pumpfun",
            Protocol::Boopfun => "Boopfun",
            Protocol::MeteoraDbc => "MeteoraDBC",
            Protocol::MeteoraDlmm => "MeteoraDLMM",
            Protocol::MeteoraDamm => "MeteoraDAMM",
            Protocol::MeteoraDammV2 => "MeteoraDAMMv2",
            Protocol::Moonit => "Moonit",
            Protocol::RaydiumLaunchpad => "RaydiumLaunchpad",
            Protocol::Sugar => "Sugar",
        }
    }

    /// 协议的静态分发表
    pub fn routes(&self) -> &'static [EventRoute] {
        match self {
            Protocol::Pumpfun => pumpfun::ROUTES,
            Protocol::Boopfun => boopfun::ROUTES,
            Protocol::MeteoraDbc => meteora_dbc::ROUTES,
            Protocol::MeteoraDlmm | Protocol::MeteoraDamm | Protocol::MeteoraDammV2 => {
                meteora_pools::ROUTES
            }
            Protocol::Moonit => moonit::ROUTES,
            Protocol::RaydiumLaunchpad => raydium_launchpad::ROUTES,
            Protocol::Sugar => sugar::ROUTES,
        }
    }

    /// 按分发表解码一条指令；首个匹配的条目决定结果，未匹配返回 `Ok(None)`
    pub fn try_decode(&self, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
        let data = ctx.instruction.data();
        let Some((route, skip)) = self.routes().iter().find_map(|r| r.match_len(data).map(|n| (r, n)))
        else {
            log::trace!(
                "{} instruction {} unmatched (discriminator {})",
                self,
                ctx.idx(),
                discriminator_hex(data)
            );
            return Ok(None);
        };

        let mut reader = BinaryReader::new(&data[skip..]);
        let event = (route.decode)(&mut reader, ctx)?;
        if event.is_none() {
            log::trace!("{} {} at {} skipped", self, route.name, ctx.idx());
        }

        // 元数据由分发循环统一写入
        Ok(event.map(|mut e| {
            e.metadata = EventMetadata {
                signature: ctx.adapter.signature(),
                slot: ctx.adapter.slot(),
                block_time: ctx.adapter.block_time(),
                idx: ctx.idx(),
            };
            e
        }))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// 分发表
// ============================================================================

pub type DecodeFn = fn(&mut BinaryReader<'_>, &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>>;

/// 分发表条目：任一判别码前缀匹配即调用 `decode`，读取器从判别码之后开始
pub struct EventRoute {
    pub name: &'static str,
    pub discriminators: &'static [&'static [u8]],
    pub decode: DecodeFn,
}

impl EventRoute {
    /// 匹配的判别码长度（即需要跳过的字节数）
    #[inline]
    pub fn match_len(&self, data: &[u8]) -> Option<usize> {
        self.discriminators.iter().find(|d| data.starts_with(d)).map(|d| d.len())
    }
}

impl fmt::Debug for EventRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRoute")
            .field("name", &self.name)
            .field("discriminators", &self.discriminators.len())
            .finish()
    }
}

// ============================================================================
// 解码上下文
// ============================================================================

/// 解码函数可见的只读上下文
pub struct DecodeContext<'a> {
    pub protocol: Protocol,
    pub instruction: ClassifiedInstruction<'a>,
    pub adapter: &'a TransactionAdapter,
    pub classifier: &'a InstructionClassifier<'a>,
    pub transfers: &'a TransferMap,
}

impl<'a> DecodeContext<'a> {
    #[inline]
    pub fn program_id(&self) -> Pubkey {
        self.instruction.program_id
    }

    #[inline]
    pub fn idx(&self) -> InstructionIndex {
        self.instruction.idx()
    }

    #[inline]
    pub fn signer(&self) -> Pubkey {
        self.adapter.signer()
    }

    #[inline]
    pub fn accounts(&self) -> &'a [Pubkey] {
        self.instruction.accounts()
    }

    #[inline]
    pub fn account(&self, index: usize) -> DecodeResult<Pubkey> {
        get_account(self.accounts(), index)
    }

    /// 当前指令引起的转账
    #[inline]
    pub fn transfers(&self) -> &'a [TransferRecord] {
        self.transfers.get(&self.program_id(), self.idx())
    }

    /// 至少 `n` 条转账，否则为结构性错误
    pub fn require_transfers(&self, n: usize) -> DecodeResult<&'a [TransferRecord]> {
        let transfers = self.transfers();
        if transfers.len() < n {
            return Err(DecodeError::MissingTransfer { expected: n, found: transfers.len() });
        }
        Ok(transfers)
    }

    /// 预填协议与程序的空事件
    pub fn event(&self, event_type: MemeEventType) -> MemeEvent {
        MemeEvent {
            protocol: self.protocol,
            program_id: self.program_id(),
            event_type,
            ..Default::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! 单条指令的解码测试桩

    use super::*;
    use crate::core::transfers::TransferCorrelator;

    /// 对交易中所有属于 `protocol` 的指令运行分发，返回 (结果, 位置)
    pub fn decode_all(
        protocol: Protocol,
        adapter: &TransactionAdapter,
    ) -> Vec<(DecodeResult<Option<MemeEvent>>, InstructionIndex)> {
        let classifier = InstructionClassifier::new(adapter);
        let transfers = TransferCorrelator::default().correlate(adapter);
        classifier
            .instructions_for(&protocol.program_id())
            .into_iter()
            .map(|ci| {
                let ctx = DecodeContext {
                    protocol,
                    instruction: ci,
                    adapter,
                    classifier: &classifier,
                    transfers: &transfers,
                };
                (protocol.try_decode(&ctx), ci.idx())
            })
            .collect()
    }

    /// 第一条成功解码的事件
    pub fn decode_first(protocol: Protocol, adapter: &TransactionAdapter) -> DecodeResult<Option<MemeEvent>> {
        for (result, _) in decode_all(protocol, adapter) {
            match result {
                Ok(None) => continue,
                other => return other,
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_program_id_roundtrip() {
        for protocol in Protocol::ALL {
            assert_eq!(Protocol::from_program_id(&protocol.program_id()), Some(protocol));
        }
        assert_eq!(Protocol::from_program_id(&TOKEN_PROGRAM_ID), None);
        assert_eq!(Protocol::RaydiumLaunchpad.to_string(), "RaydiumLaunchpad");
    }

    #[test]
    fn test_route_match_len() {
        fn noop(_: &mut BinaryReader<'_>, _: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
            Ok(None)
        }
        let route = EventRoute { name: "x", discriminators: &[&[1, 2], &[3, 4, 5]], decode: noop };
        assert_eq!(route.match_len(&[1, 2, 9]), Some(2));
        assert_eq!(route.match_len(&[3, 4, 5]), Some(3));
        assert_eq!(route.match_len(&[3, 4]), None);
    }

    #[test]
    fn test_every_route_table_is_non_empty() {
        for protocol in Protocol::ALL {
            assert!(!protocol.routes().is_empty(), "{protocol}");
        }
    }
}
