//! 交易合成
//!
//! 把 BUY / SELL / TRADE 事件转换成精度已解析的 [`TradeInfo`]。
//! 已带 UI 数量的代币直接采用；其余通过交易视图的 mint 精度查询补全，
//! 查询失败时退回解码器给出的默认精度。

use solana_sdk::pubkey::Pubkey;

use crate::core::adapter::TransactionAdapter;
use crate::core::error::{DecodeError, DecodeResult};
use crate::core::events::{
    DexInfo, FeeInfo, MemeEvent, MemeEventType, TokenAmount, TokenInfo, TradeInfo, TradeType,
};

pub struct TradeSynthesizer<'a> {
    adapter: &'a TransactionAdapter,
    dex_info: &'a DexInfo,
}

impl<'a> TradeSynthesizer<'a> {
    pub fn new(adapter: &'a TransactionAdapter, dex_info: &'a DexInfo) -> Self {
        Self { adapter, dex_info }
    }

    /// 非交易类事件或缺少任一侧数量时返回 `Ok(None)`
    pub fn synthesize(&self, event: &MemeEvent) -> DecodeResult<Option<TradeInfo>> {
        if !event.event_type.is_trade() {
            return Ok(None);
        }
        let (Some(input), Some(output)) = (&event.input_token, &event.output_token) else {
            log::trace!("{} {:?} at {} has no amounts", event.protocol, event.event_type, event.metadata.idx);
            return Ok(None);
        };
        if input.mint == output.mint {
            return Err(DecodeError::SameMintTrade { mint: input.mint });
        }

        let input_token = self.resolve(input)?;
        let output_token = self.resolve(output)?;
        let trade_type = trade_direction(event, &input_token.mint);

        let quote_mint = event.quote_mint.unwrap_or(match event.base_mint {
            Some(base) if base == input_token.mint => output_token.mint,
            _ => input_token.mint,
        });

        let mut fees = Vec::with_capacity(event.fees.len());
        let mut quote_fee: u128 = 0;
        for component in event.fees.iter().filter(|c| c.amount_raw > 0) {
            let decimals = self.decimals_of(&component.mint, None)?;
            if component.mint == quote_mint {
                quote_fee = quote_fee.saturating_add(component.amount_raw);
            }
            let ui = TokenInfo::new(component.mint, component.amount_raw, decimals);
            fees.push(FeeInfo {
                fee_type: component.fee_type,
                mint: component.mint,
                amount_raw: component.amount_raw,
                ui_amount: ui.ui_amount,
                decimals,
                recipient: component.recipient,
            });
        }
        let fee = if quote_fee > 0 {
            Some(TokenInfo::new(quote_mint, quote_fee, self.decimals_of(&quote_mint, None)?))
        } else {
            None
        };

        let mut pools = Vec::with_capacity(2);
        for account in [event.pool, event.bonding_curve].into_iter().flatten() {
            if !pools.contains(&account) {
                pools.push(account);
            }
        }

        let name = event.protocol.name();
        Ok(Some(TradeInfo {
            metadata: event.metadata.clone(),
            trade_type,
            protocol: event.protocol,
            pools,
            input_token,
            output_token,
            fee,
            fees,
            user: event.user.unwrap_or_else(|| self.adapter.signer()),
            program_id: self.dex_info.program_id.unwrap_or(event.program_id),
            amm: self.dex_info.amm.clone().unwrap_or_else(|| name.to_string()),
            route: self.dex_info.route.clone().unwrap_or_else(|| name.to_string()),
        }))
    }

    fn resolve(&self, amount: &TokenAmount) -> DecodeResult<TokenInfo> {
        if let (Some(decimals), Some(ui_amount)) = (amount.decimals, amount.ui_amount) {
            return Ok(TokenInfo { mint: amount.mint, amount_raw: amount.amount_raw, ui_amount, decimals });
        }
        let decimals = self.decimals_of(&amount.mint, amount.decimals)?;
        Ok(TokenInfo::new(amount.mint, amount.amount_raw, decimals))
    }

    /// 查询优先，`hint` 兜底
    fn decimals_of(&self, mint: &Pubkey, hint: Option<u8>) -> DecodeResult<u8> {
        match self.adapter.mint_decimals(mint) {
            Ok(decimals) => Ok(decimals),
            Err(err) => hint.ok_or(err),
        }
    }
}

/// BUY / SELL 事件沿用自身类型；TRADE 事件按输入是否为 base 判断
pub fn trade_direction(event: &MemeEvent, input_mint: &Pubkey) -> TradeType {
    match event.event_type {
        MemeEventType::Buy => TradeType::Buy,
        MemeEventType::Sell => TradeType::Sell,
        _ if event.base_mint.as_ref() == Some(input_mint) => TradeType::Sell,
        _ => TradeType::Buy,
    }
}
