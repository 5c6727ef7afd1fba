//! Raydium Launchpad 指令解析器
//!
//! 交易数量不在 buy/sell 指令里，而在其后的自调用 `TradeEvent` 内层指令中；
//! 该事件按负载长度区分新旧布局（旧版无 creator_fee）。

use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;

use crate::core::error::{DecodeError, DecodeResult};
use crate::core::events::{FeeComponent, FeeType, MemeEvent, MemeEventType, TokenAmount};
use crate::core::reader::BinaryReader;
use crate::instr::program_ids::RAYDIUM_LAUNCHPAD_PROGRAM_ID;
use crate::instr::utils::event_discriminator;
use crate::instr::{DecodeContext, EventRoute};

/// Raydium Launchpad discriminator 常量
pub mod discriminators {
    use super::event_discriminator;

    pub const BUY_EXACT_IN: [u8; 8] = [250, 234, 13, 123, 213, 156, 19, 236];
    pub const BUY_EXACT_OUT: [u8; 8] = [24, 211, 116, 40, 105, 3, 153, 56];
    pub const SELL_EXACT_IN: [u8; 8] = [149, 39, 222, 155, 211, 124, 152, 26];
    pub const SELL_EXACT_OUT: [u8; 8] = [95, 200, 71, 34, 8, 9, 11, 166];
    pub const INITIALIZE: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];
    pub const INITIALIZE_V2: [u8; 8] = [67, 153, 175, 39, 218, 16, 38, 32];
    pub const INITIALIZE_WITH_TOKEN_2022: [u8; 8] = [37, 190, 126, 222, 44, 154, 171, 17];
    pub const MIGRATE_TO_AMM: [u8; 8] = [207, 82, 192, 145, 254, 207, 145, 223];
    pub const MIGRATE_TO_CPSWAP: [u8; 8] = [136, 92, 200, 103, 28, 218, 144, 140];

    pub const TRADE_EVENT: [u8; 16] = event_discriminator([189, 219, 127, 211, 78, 230, 97, 238]);
}

pub const ROUTES: &[EventRoute] = &[
    EventRoute {
        name: "trade",
        discriminators: &[
            &discriminators::BUY_EXACT_IN,
            &discriminators::BUY_EXACT_OUT,
            &discriminators::SELL_EXACT_IN,
            &discriminators::SELL_EXACT_OUT,
        ],
        decode: decode_trade,
    },
    EventRoute {
        name: "initialize",
        discriminators: &[
            &discriminators::INITIALIZE,
            &discriminators::INITIALIZE_V2,
            &discriminators::INITIALIZE_WITH_TOKEN_2022,
        ],
        decode: decode_initialize,
    },
    EventRoute { name: "migrate_to_amm", discriminators: &[&discriminators::MIGRATE_TO_AMM], decode: decode_migrate_amm },
    EventRoute {
        name: "migrate_to_cpswap",
        discriminators: &[&discriminators::MIGRATE_TO_CPSWAP],
        decode: decode_migrate_cpswap,
    },
];

// ============================================================================
// TradeEvent 布局
// ============================================================================

/// 旧版 TradeEvent 负载长度（无 creator_fee）
pub const TRADE_EVENT_LEGACY_LEN: usize = 131;
/// 当前 TradeEvent 负载长度
pub const TRADE_EVENT_LEN: usize = 139;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshDeserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshDeserialize)]
pub enum PoolStatus {
    Fund,
    Migrate,
    Trade,
}

/// 旧版布局
#[derive(Debug, Clone, BorshDeserialize)]
pub struct LegacyTradeEvent {
    pub pool_state: [u8; 32],
    pub total_base_sell: u64,
    pub virtual_base: u64,
    pub virtual_quote: u64,
    pub real_base_before: u64,
    pub real_quote_before: u64,
    pub real_base_after: u64,
    pub real_quote_after: u64,
    pub amount_in: u64,
    pub amount_out: u64,
    pub protocol_fee: u64,
    pub platform_fee: u64,
    pub share_fee: u64,
    pub trade_direction: TradeDirection,
    pub pool_status: PoolStatus,
    pub exact_in: bool,
}

#[derive(Debug, Clone, BorshDeserialize)]
pub struct CurrentTradeEvent {
    pub pool_state: [u8; 32],
    pub total_base_sell: u64,
    pub virtual_base: u64,
    pub virtual_quote: u64,
    pub real_base_before: u64,
    pub real_quote_before: u64,
    pub real_base_after: u64,
    pub real_quote_after: u64,
    pub amount_in: u64,
    pub amount_out: u64,
    pub protocol_fee: u64,
    pub platform_fee: u64,
    pub creator_fee: u64,
    pub share_fee: u64,
    pub trade_direction: TradeDirection,
    pub pool_status: PoolStatus,
    pub exact_in: bool,
}

/// 两种布局归一后的交易记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchpadTrade {
    pub pool_state: Pubkey,
    pub amount_in: u64,
    pub amount_out: u64,
    pub protocol_fee: u64,
    pub platform_fee: u64,
    pub creator_fee: u64,
    pub share_fee: u64,
    pub trade_direction: TradeDirection,
    pub pool_status: PoolStatus,
    pub exact_in: bool,
}

impl From<LegacyTradeEvent> for LaunchpadTrade {
    fn from(e: LegacyTradeEvent) -> Self {
        Self {
            pool_state: Pubkey::new_from_array(e.pool_state),
            amount_in: e.amount_in,
            amount_out: e.amount_out,
            protocol_fee: e.protocol_fee,
            platform_fee: e.platform_fee,
            creator_fee: 0,
            share_fee: e.share_fee,
            trade_direction: e.trade_direction,
            pool_status: e.pool_status,
            exact_in: e.exact_in,
        }
    }
}

impl From<CurrentTradeEvent> for LaunchpadTrade {
    fn from(e: CurrentTradeEvent) -> Self {
        Self {
            pool_state: Pubkey::new_from_array(e.pool_state),
            amount_in: e.amount_in,
            amount_out: e.amount_out,
            protocol_fee: e.protocol_fee,
            platform_fee: e.platform_fee,
            creator_fee: e.creator_fee,
            share_fee: e.share_fee,
            trade_direction: e.trade_direction,
            pool_status: e.pool_status,
            exact_in: e.exact_in,
        }
    }
}

/// 按负载长度选择布局
pub fn parse_trade_event(payload: &[u8]) -> DecodeResult<LaunchpadTrade> {
    let invalid = |e: std::io::Error| DecodeError::InvalidLayout(format!("launchpad TradeEvent: {e}"));
    let mut buf = payload;
    match payload.len() {
        n if n >= TRADE_EVENT_LEN => CurrentTradeEvent::deserialize(&mut buf).map(Into::into).map_err(invalid),
        n if n >= TRADE_EVENT_LEGACY_LEN => LegacyTradeEvent::deserialize(&mut buf).map(Into::into).map_err(invalid),
        n => Err(DecodeError::OutOfBounds { needed: TRADE_EVENT_LEGACY_LEN, remaining: n }),
    }
}

// ============================================================================
// 指令
// ============================================================================

/// buy_exact_in / buy_exact_out / sell_exact_in / sell_exact_out
///
/// Account indices: 0: payer, 4: pool_state, 9: base_mint, 10: quote_mint
fn decode_trade(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let payer = ctx.account(0)?;
    let pool_state = ctx.account(4)?;
    let base_mint = ctx.account(9)?;
    let quote_mint = ctx.account(10)?;

    let event_ix = ctx
        .classifier
        .find_inner_after(&ctx.instruction, |next| {
            next.program_id == RAYDIUM_LAUNCHPAD_PROGRAM_ID && next.starts_with(&discriminators::TRADE_EVENT)
        })
        .ok_or(DecodeError::MissingInstruction("TradeEvent"))?;
    let trade = parse_trade_event(&event_ix.data()[discriminators::TRADE_EVENT.len()..])?;

    let base = |amount: u64| TokenAmount::raw(base_mint, amount);
    let quote = |amount: u64| TokenAmount::raw(quote_mint, amount);
    let (event_type, input_token, output_token) = match trade.trade_direction {
        TradeDirection::Buy => (MemeEventType::Buy, quote(trade.amount_in), base(trade.amount_out)),
        TradeDirection::Sell => (MemeEventType::Sell, base(trade.amount_in), quote(trade.amount_out)),
    };

    let fees = [
        (FeeType::Protocol, trade.protocol_fee),
        (FeeType::Platform, trade.platform_fee),
        (FeeType::Creator, trade.creator_fee),
        (FeeType::Share, trade.share_fee),
    ]
    .into_iter()
    .map(|(fee_type, amount)| FeeComponent::new(fee_type, quote_mint, amount))
    .collect();

    Ok(Some(MemeEvent {
        base_mint: Some(base_mint),
        quote_mint: Some(quote_mint),
        user: Some(payer),
        pool: Some(pool_state),
        bonding_curve: Some(pool_state),
        input_token: Some(input_token),
        output_token: Some(output_token),
        fees,
        ..ctx.event(event_type)
    }))
}

/// initialize(base_mint_param: MintParams{decimals, name, symbol, uri}, curve_param, vesting_param)
///
/// Account indices: 1: creator, 5: pool_state, 6: base_mint, 7: quote_mint
fn decode_initialize(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let _decimals = reader.read_u8()?;
    let name = reader.read_string()?;
    let symbol = reader.read_string()?;
    let uri = reader.read_string()?;
    let creator = ctx.account(1)?;

    Ok(Some(MemeEvent {
        base_mint: Some(ctx.account(6)?),
        quote_mint: Some(ctx.account(7)?),
        pool: Some(ctx.account(5)?),
        bonding_curve: Some(ctx.account(5)?),
        user: Some(creator),
        creator: Some(creator),
        name: Some(name),
        symbol: Some(symbol),
        uri: Some(uri),
        ..ctx.event(MemeEventType::Create)
    }))
}

fn migrate_event(ctx: &DecodeContext<'_>, pool_index: usize, pool_state_index: usize) -> DecodeResult<Option<MemeEvent>> {
    Ok(Some(MemeEvent {
        base_mint: Some(ctx.account(1)?),
        quote_mint: Some(ctx.account(2)?),
        pool: Some(ctx.account(pool_index)?),
        bonding_curve: Some(ctx.account(pool_state_index)?),
        user: Some(ctx.account(0)?),
        ..ctx.event(MemeEventType::Migrate)
    }))
}

/// Account indices: 0: payer, 1: base_mint, 2: quote_mint, 12: amm pool, 22: pool_state
fn decode_migrate_amm(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    migrate_event(ctx, 12, 22)
}

/// Account indices: 0: payer, 1: base_mint, 2: quote_mint, 5: cpswap pool, 17: pool_state
fn decode_migrate_cpswap(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    migrate_event(ctx, 5, 17)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::adapter::fixtures::TxBuilder;
    use crate::instr::program_ids::WSOL_MINT;
    use crate::instr::test_support::{decode_all, decode_first};
    use crate::instr::Protocol;

    /// TradeEvent 自调用指令数据；`creator_fee` 为 None 时生成旧版布局
    pub fn trade_event_data(pool: Pubkey, amount_in: u64, amount_out: u64, sell: bool, creator_fee: Option<u64>) -> Vec<u8> {
        let mut data = discriminators::TRADE_EVENT.to_vec();
        data.extend_from_slice(pool.as_ref());
        for v in [793_100_000_000_000u64, 1_073_025_605_596_382, 30_000_852_951, 0, 0, 0, 0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&amount_out.to_le_bytes());
        data.extend_from_slice(&2_500_000u64.to_le_bytes()); // protocol
        data.extend_from_slice(&0u64.to_le_bytes()); // platform
        if let Some(fee) = creator_fee {
            data.extend_from_slice(&fee.to_le_bytes());
        }
        data.extend_from_slice(&0u64.to_le_bytes()); // share
        data.push(sell as u8);
        data.push(0);
        data.push(1);
        data
    }

    pub fn trade_accounts(payer: Pubkey, pool: Pubkey, base: Pubkey) -> Vec<Pubkey> {
        let mut accounts: Vec<Pubkey> = (0..15).map(|_| Pubkey::new_unique()).collect();
        accounts[0] = payer;
        accounts[4] = pool;
        accounts[9] = base;
        accounts[10] = WSOL_MINT;
        accounts
    }

    #[test]
    fn test_layout_selected_by_length() {
        let pool = Pubkey::new_unique();
        let legacy = trade_event_data(pool, 1, 2, false, None);
        let current = trade_event_data(pool, 1, 2, false, Some(77));
        assert_eq!(legacy.len() - 16, TRADE_EVENT_LEGACY_LEN);
        assert_eq!(current.len() - 16, TRADE_EVENT_LEN);

        let old = parse_trade_event(&legacy[16..]).unwrap();
        assert_eq!(old.creator_fee, 0);
        assert_eq!(old.pool_state, pool);
        assert!(old.exact_in);
        let new = parse_trade_event(&current[16..]).unwrap();
        assert_eq!(new.creator_fee, 77);
        assert_eq!(new.trade_direction, TradeDirection::Buy);

        assert!(matches!(parse_trade_event(&legacy[16..100]), Err(DecodeError::OutOfBounds { .. })));
    }

    #[test]
    fn test_invalid_enum_tag_is_layout_error() {
        let mut data = trade_event_data(Pubkey::new_unique(), 1, 2, false, Some(0));
        let direction_at = data.len() - 3;
        data[direction_at] = 9;
        assert!(matches!(parse_trade_event(&data[16..]), Err(DecodeError::InvalidLayout(_))));
    }

    #[test]
    fn test_trade_reads_following_event() {
        let (payer, pool, base) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let adapter = TxBuilder::new(payer)
            .token_account(Pubkey::new_unique(), base, payer, 6, 0, 35_000_000_000)
            .instruction(RAYDIUM_LAUNCHPAD_PROGRAM_ID, trade_accounts(payer, pool, base), discriminators::BUY_EXACT_IN.to_vec())
            .inner(0, RAYDIUM_LAUNCHPAD_PROGRAM_ID, vec![], trade_event_data(pool, 1_000_000_000, 35_000_000_000, false, Some(300_000)))
            .build();

        let results = decode_all(Protocol::RaydiumLaunchpad, &adapter);
        let event = results[0].0.clone().unwrap().unwrap();
        assert_eq!(event.event_type, MemeEventType::Buy);
        assert_eq!(event.input_token, Some(TokenAmount::raw(WSOL_MINT, 1_000_000_000u64)));
        assert_eq!(event.output_token.as_ref().unwrap().amount_raw, 35_000_000_000);
        assert_eq!(event.fees.len(), 4);
        assert_eq!(event.fees[2].fee_type, FeeType::Creator);
        assert_eq!(event.fees[2].amount_raw, 300_000);
        // 事件指令自身不产生事件
        assert_eq!(results[1].0, Ok(None));
    }

    #[test]
    fn test_trade_without_event_is_error() {
        let (payer, pool, base) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let adapter = TxBuilder::new(payer)
            .instruction(RAYDIUM_LAUNCHPAD_PROGRAM_ID, trade_accounts(payer, pool, base), discriminators::SELL_EXACT_IN.to_vec())
            .build();
        assert_eq!(
            decode_first(Protocol::RaydiumLaunchpad, &adapter),
            Err(DecodeError::MissingInstruction("TradeEvent"))
        );
    }

    #[test]
    fn test_initialize_and_migrations() {
        let accounts: Vec<Pubkey> = (0..24).map(|_| Pubkey::new_unique()).collect();
        let mut init = discriminators::INITIALIZE_V2.to_vec();
        init.push(6);
        for s in ["Bonk Dog", "BDOG", "https://bonk.fun/bdog"] {
            init.extend_from_slice(&(s.len() as u32).to_le_bytes());
            init.extend_from_slice(s.as_bytes());
        }
        let adapter = TxBuilder::new(accounts[0])
            .instruction(RAYDIUM_LAUNCHPAD_PROGRAM_ID, accounts.clone(), init)
            .instruction(RAYDIUM_LAUNCHPAD_PROGRAM_ID, accounts.clone(), discriminators::MIGRATE_TO_AMM.to_vec())
            .instruction(RAYDIUM_LAUNCHPAD_PROGRAM_ID, accounts.clone(), discriminators::MIGRATE_TO_CPSWAP.to_vec())
            .build();

        let events: Vec<MemeEvent> =
            decode_all(Protocol::RaydiumLaunchpad, &adapter).into_iter().map(|(r, _)| r.unwrap().unwrap()).collect();
        assert_eq!(events[0].event_type, MemeEventType::Create);
        assert_eq!(events[0].creator, Some(accounts[1]));
        assert_eq!(events[0].base_mint, Some(accounts[6]));
        assert_eq!(events[0].symbol.as_deref(), Some("BDOG"));
        assert_eq!(events[1].pool, Some(accounts[12]));
        assert_eq!(events[1].bonding_curve, Some(accounts[22]));
        assert_eq!(events[2].pool, Some(accounts[5]));
        assert_eq!(events[2].bonding_curve, Some(accounts[17]));
    }
}
