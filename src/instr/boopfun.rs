//! Boop.fun 指令解析器
//!
//! 联合曲线发射台：BUY / SELL 指令只携带一侧数量，另一侧取自关联转账；
//! 毕业（graduate）按 SOL 转账金额降序区分本金与手续费。

use crate::core::error::{DecodeError, DecodeResult};
use crate::core::events::{FeeComponent, FeeType, MemeEvent, MemeEventType, TokenAmount};
use crate::core::reader::BinaryReader;
use crate::instr::program_ids::{BOOPFUN_PROGRAM_ID, WSOL_MINT};
use crate::instr::{DecodeContext, EventRoute};

/// Boop.fun discriminator 常量
pub mod discriminators {
    pub const CREATE_TOKEN: [u8; 8] = [84, 52, 204, 228, 24, 140, 234, 75];
    pub const DEPLOY_BONDING_CURVE: [u8; 8] = [180, 89, 199, 76, 168, 236, 217, 138];
    pub const BUY_TOKEN: [u8; 8] = [138, 127, 14, 91, 38, 87, 115, 105];
    pub const SELL_TOKEN: [u8; 8] = [109, 61, 40, 187, 230, 176, 135, 174];
    pub const GRADUATE: [u8; 8] = [45, 235, 225, 181, 17, 218, 64, 130];
}

pub const ROUTES: &[EventRoute] = &[
    EventRoute { name: "create_token", discriminators: &[&discriminators::CREATE_TOKEN], decode: decode_create },
    EventRoute { name: "buy_token", discriminators: &[&discriminators::BUY_TOKEN], decode: decode_buy },
    EventRoute { name: "sell_token", discriminators: &[&discriminators::SELL_TOKEN], decode: decode_sell },
    EventRoute { name: "graduate", discriminators: &[&discriminators::GRADUATE], decode: decode_graduate },
];

/// create_token(salt, name, symbol, uri)
///
/// Account indices: 2: mint, 3: payer；
/// 联合曲线在同一外层下的 `deploy_bonding_curve` 指令中（2: bonding_curve）
fn decode_create(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let _salt = reader.read_u64()?;
    let name = reader.read_string()?;
    let symbol = reader.read_string()?;
    let uri = reader.read_string()?;

    let mint = ctx.account(2)?;
    let user = ctx.account(3)?;
    let bonding_curve = ctx
        .classifier
        .find_by_discriminator(
            Some(&BOOPFUN_PROGRAM_ID),
            &discriminators::DEPLOY_BONDING_CURVE,
            Some(ctx.instruction.outer_index),
        )
        .and_then(|deploy| deploy.accounts().get(2).copied());

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        creator: Some(user),
        bonding_curve,
        name: Some(name),
        symbol: Some(symbol),
        uri: Some(uri),
        ..ctx.event(MemeEventType::Create)
    }))
}

/// buy_token(buy_amount, amount_out_min)
///
/// Account indices: 0: mint, 1: bonding_curve, 6: buyer
fn decode_buy(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let sol_amount = reader.read_u64()?;
    let mint = ctx.account(0)?;
    let bonding_curve = ctx.account(1)?;
    let user = ctx.account(6)?;

    let transfers = ctx.require_transfers(1)?;
    let token = transfers
        .iter()
        .find(|t| t.mint == mint)
        .ok_or(DecodeError::MissingTransfer { expected: 1, found: 0 })?;

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        bonding_curve: Some(bonding_curve),
        input_token: Some(TokenAmount::sol(sol_amount)),
        output_token: Some(token.token_amount()),
        ..ctx.event(MemeEventType::Buy)
    }))
}

/// sell_token(sell_amount, amount_out_min)
///
/// Account indices: 0: mint, 1: bonding_curve, 6: seller
fn decode_sell(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let token_amount = reader.read_u64()?;
    let mint = ctx.account(0)?;
    let bonding_curve = ctx.account(1)?;
    let user = ctx.account(6)?;

    let transfers = ctx.require_transfers(1)?;
    let sol = transfers
        .iter()
        .find(|t| t.is_sol())
        .ok_or(DecodeError::MissingTransfer { expected: 1, found: 0 })?;

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        bonding_curve: Some(bonding_curve),
        // 精度由合成器查询
        input_token: Some(TokenAmount::raw(mint, token_amount)),
        output_token: Some(sol.token_amount()),
        ..ctx.event(MemeEventType::Sell)
    }))
}

/// graduate()
///
/// Account indices: 0: mint, 7: bonding_curve, 10: payer
fn decode_graduate(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let mint = ctx.account(0)?;
    let bonding_curve = ctx.account(7)?;
    let user = ctx.account(10)?;

    let mut sol_transfers: Vec<_> = ctx.transfers().iter().filter(|t| t.is_sol()).collect();
    if sol_transfers.is_empty() {
        return Err(DecodeError::MissingTransfer { expected: 1, found: 0 });
    }
    sol_transfers.sort_by(|a, b| b.ui_amount.total_cmp(&a.ui_amount));

    let principal = sol_transfers[0];
    let fees = sol_transfers
        .get(1)
        .map(|fee| {
            let component = FeeComponent::new(FeeType::Protocol, WSOL_MINT, fee.amount_raw);
            match fee.destination_owner {
                Some(recipient) => vec![component.with_recipient(recipient)],
                None => vec![component],
            }
        })
        .unwrap_or_default();

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        bonding_curve: Some(bonding_curve),
        input_token: Some(principal.token_amount()),
        fees,
        ..ctx.event(MemeEventType::Complete)
    }))
}
