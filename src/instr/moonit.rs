//! Moonit 指令解析器
//!
//! buy / sell 指令只携带上下限（token 数量、抵押物数量、滑点），
//! 实际成交额由余额快照差值重建：曲线 token 账户、曲线 SOL 账户、两个手续费账户。

use solana_sdk::pubkey::Pubkey;

use crate::core::error::{DecodeError, DecodeResult};
use crate::core::events::{FeeComponent, FeeType, MemeEvent, MemeEventType, TokenAmount};
use crate::core::reader::BinaryReader;
use crate::instr::program_ids::WSOL_MINT;
use crate::instr::{DecodeContext, EventRoute};

/// Moonit discriminator 常量
pub mod discriminators {
    pub const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
    pub const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
    pub const TOKEN_MINT: [u8; 8] = [3, 44, 164, 184, 123, 13, 245, 179];
    pub const MIGRATE_FUNDS: [u8; 8] = [42, 229, 10, 231, 189, 62, 193, 174];
}

pub const ROUTES: &[EventRoute] = &[
    EventRoute { name: "buy", discriminators: &[&discriminators::BUY], decode: decode_buy },
    EventRoute { name: "sell", discriminators: &[&discriminators::SELL], decode: decode_sell },
    EventRoute { name: "token_mint", discriminators: &[&discriminators::TOKEN_MINT], decode: decode_create },
    EventRoute { name: "migrate_funds", discriminators: &[&discriminators::MIGRATE_FUNDS], decode: decode_migrate },
];

/// TradeParams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeParams {
    pub token_amount: u64,
    pub collateral_amount: u64,
    pub fixed_side: u8,
    pub slippage_bps: u64,
}

impl TradeParams {
    pub fn read(reader: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            token_amount: reader.read_u64()?,
            collateral_amount: reader.read_u64()?,
            fixed_side: reader.read_u8()?,
            slippage_bps: reader.read_u64()?,
        })
    }
}

/// 一次成交的余额变化
struct Settlement {
    mint: Pubkey,
    token_decimals: u8,
    token_delta: u128,
    curve_sol_delta: u128,
    dex_fee: u128,
    helio_fee: u128,
}

/// 余额差值的期望方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    In,
    Out,
}

/// 差值方向与成交方向不符时视为布局错误；零差值允许
fn directed(account: Pubkey, delta: i128, flow: Flow) -> DecodeResult<u128> {
    let wrong_way = match flow {
        Flow::In => delta < 0,
        Flow::Out => delta > 0,
    };
    if wrong_way {
        return Err(DecodeError::InvalidLayout(format!(
            "balance of {account} moved {delta}, expected {flow:?} flow"
        )));
    }
    Ok(delta.unsigned_abs())
}

fn lamport_delta(ctx: &DecodeContext<'_>, account: Pubkey, flow: Flow) -> DecodeResult<u128> {
    let delta = ctx
        .adapter
        .balance_change(&account)
        .ok_or(DecodeError::MissingBalance { account })?;
    directed(account, delta, flow)
}

/// Account indices: 0: sender, 2: curve_account, 3: curve_token_account,
/// 4: dex_fee, 5: helio_fee, 6: mint
///
/// 买入时曲线收 SOL、付 token；卖出相反。手续费账户只进不出。
fn settle(ctx: &DecodeContext<'_>, is_buy: bool) -> DecodeResult<Settlement> {
    let curve = ctx.account(2)?;
    let curve_token = ctx.account(3)?;
    let dex_fee = ctx.account(4)?;
    let helio_fee = ctx.account(5)?;
    let mint = ctx.account(6)?;
    let (token_flow, sol_flow) = if is_buy { (Flow::Out, Flow::In) } else { (Flow::In, Flow::Out) };

    let token_delta = ctx
        .adapter
        .token_balance_change(&curve_token)
        .ok_or(DecodeError::MissingBalance { account: curve_token })?;
    let token_decimals = match ctx.adapter.token_account_info(&curve_token) {
        Some(info) => info.decimals,
        None => ctx.adapter.mint_decimals(&mint)?,
    };

    Ok(Settlement {
        mint,
        token_decimals,
        token_delta: directed(curve_token, token_delta, token_flow)?,
        curve_sol_delta: lamport_delta(ctx, curve, sol_flow)?,
        dex_fee: lamport_delta(ctx, dex_fee, Flow::In)?,
        helio_fee: lamport_delta(ctx, helio_fee, Flow::In)?,
    })
}

fn fee_components(ctx: &DecodeContext<'_>, s: &Settlement) -> DecodeResult<Vec<FeeComponent>> {
    Ok(vec![
        FeeComponent::new(FeeType::Dex, WSOL_MINT, s.dex_fee).with_recipient(ctx.account(4)?),
        FeeComponent::new(FeeType::Helio, WSOL_MINT, s.helio_fee).with_recipient(ctx.account(5)?),
    ])
}

fn decode_buy(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let _params = TradeParams::read(reader)?;
    let s = settle(ctx, true)?;
    // 买入：用户支付 = 曲线收到的 SOL + 两项手续费
    let sol_in = s.curve_sol_delta + s.dex_fee + s.helio_fee;

    Ok(Some(MemeEvent {
        base_mint: Some(s.mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(ctx.account(0)?),
        bonding_curve: Some(ctx.account(2)?),
        input_token: Some(TokenAmount::sol(sol_in)),
        output_token: Some(TokenAmount::with_decimals(s.mint, s.token_delta, s.token_decimals)),
        fees: fee_components(ctx, &s)?,
        ..ctx.event(MemeEventType::Buy)
    }))
}

fn decode_sell(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let _params = TradeParams::read(reader)?;
    let s = settle(ctx, false)?;
    // 卖出：曲线付出的 SOL 扣除手续费后到账
    let sol_out = s.curve_sol_delta.saturating_sub(s.dex_fee + s.helio_fee);

    Ok(Some(MemeEvent {
        base_mint: Some(s.mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(ctx.account(0)?),
        bonding_curve: Some(ctx.account(2)?),
        input_token: Some(TokenAmount::with_decimals(s.mint, s.token_delta, s.token_decimals)),
        output_token: Some(TokenAmount::sol(sol_out)),
        fees: fee_components(ctx, &s)?,
        ..ctx.event(MemeEventType::Sell)
    }))
}

/// token_mint(name, symbol, uri, decimals, collateral_currency, amount, curve_type, migration_target)
///
/// Account indices: 0: sender, 2: curve_account, 3: mint
fn decode_create(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let name = reader.read_string()?;
    let symbol = reader.read_string()?;
    let uri = reader.read_string()?;
    let sender = ctx.account(0)?;

    Ok(Some(MemeEvent {
        base_mint: Some(ctx.account(3)?),
        quote_mint: Some(WSOL_MINT),
        user: Some(sender),
        creator: Some(sender),
        bonding_curve: Some(ctx.account(2)?),
        name: Some(name),
        symbol: Some(symbol),
        uri: Some(uri),
        ..ctx.event(MemeEventType::Create)
    }))
}

/// Account indices: 2: curve_account, 5: mint
fn decode_migrate(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    Ok(Some(MemeEvent {
        base_mint: Some(ctx.account(5)?),
        quote_mint: Some(WSOL_MINT),
        user: Some(ctx.signer()),
        bonding_curve: Some(ctx.account(2)?),
        ..ctx.event(MemeEventType::Migrate)
    }))
}
