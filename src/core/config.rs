//! 解析配置

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::core::error::ParseError;
use crate::core::events::MemeEventType;
use crate::core::transfers::TransferKind;
use crate::instr::Protocol;

/// 事件类型过滤器；`include_only` 优先于 `exclude_types`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventTypeFilter {
    pub include_only: Option<Vec<MemeEventType>>,
    pub exclude_types: Option<Vec<MemeEventType>>,
}

impl EventTypeFilter {
    pub fn include_only(types: Vec<MemeEventType>) -> Self {
        Self { include_only: Some(types), exclude_types: None }
    }

    pub fn exclude_types(types: Vec<MemeEventType>) -> Self {
        Self { include_only: None, exclude_types: Some(types) }
    }

    pub fn should_include(&self, event_type: MemeEventType) -> bool {
        if let Some(ref include_only) = self.include_only {
            return include_only.contains(&event_type);
        }
        if let Some(ref exclude_types) = self.exclude_types {
            return !exclude_types.contains(&event_type);
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// 仅解析这些程序
    pub program_ids: Option<Vec<Pubkey>>,
    /// 永不解析这些程序
    pub ignore_program_ids: Option<Vec<Pubkey>>,
    pub event_filter: Option<EventTypeFilter>,
    /// 转账关联器在默认类型之外接受的转账类型
    pub extra_transfer_kinds: Vec<TransferKind>,
    /// 是否运行交易合成
    pub emit_trades: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            program_ids: None,
            ignore_program_ids: None,
            event_filter: None,
            extra_transfer_kinds: Vec::new(),
            emit_trades: true,
        }
    }
}

impl ParseConfig {
    /// 只输出事件，不合成交易
    pub fn events_only() -> Self {
        Self { emit_trades: false, ..Self::default() }
    }

    pub fn for_programs(program_ids: Vec<Pubkey>) -> Self {
        Self { program_ids: Some(program_ids), ..Self::default() }
    }

    pub fn for_protocols(protocols: &[Protocol]) -> Self {
        let mut ids: Vec<Pubkey> = Vec::with_capacity(protocols.len());
        for protocol in protocols {
            let id = protocol.program_id();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self::for_programs(ids)
    }

    /// 从 JSON 读取，缺省字段取默认值
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(|e| ParseError::Conversion(format!("invalid parse config: {e}")))
    }

    pub fn with_event_filter(mut self, filter: EventTypeFilter) -> Self {
        self.event_filter = Some(filter);
        self
    }

    #[inline]
    pub fn should_parse_program(&self, program_id: &Pubkey) -> bool {
        if let Some(ref ignored) = self.ignore_program_ids {
            if ignored.contains(program_id) {
                return false;
            }
        }
        match self.program_ids {
            Some(ref allowed) => allowed.contains(program_id),
            None => true,
        }
    }

    #[inline]
    pub fn should_include(&self, event_type: MemeEventType) -> bool {
        self.event_filter.as_ref().map_or(true, |f| f.should_include(event_type))
    }
}
