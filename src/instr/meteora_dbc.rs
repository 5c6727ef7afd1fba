//! Meteora Dynamic Bonding Curve 指令解析器
//!
//! swap / swap2 的方向不看标志位，而是比较指令声明的输入/输出 token 账户
//! 与 base mint 的归属（余额快照中的 mint，或签名者的 ATA）。

use solana_sdk::pubkey::Pubkey;

use crate::core::error::{DecodeError, DecodeResult};
use crate::core::events::{MemeEvent, MemeEventType};
use crate::core::reader::BinaryReader;
use crate::core::transfers::TransferRecord;
use crate::instr::program_ids::{associated_token_address, TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::instr::{DecodeContext, EventRoute};

/// Meteora DBC discriminator 常量
pub mod discriminators {
    pub const SWAP: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];
    pub const SWAP2: [u8; 8] = [65, 75, 63, 76, 235, 91, 91, 136];
    /// initialize_virtual_pool_with_spl_token
    pub const INITIALIZE_SPL: [u8; 8] = [140, 85, 215, 176, 102, 54, 104, 79];
    /// initialize_virtual_pool_with_token2022
    pub const INITIALIZE_TOKEN_2022: [u8; 8] = [169, 118, 51, 78, 145, 110, 220, 155];
    pub const MIGRATE_METEORA_DAMM: [u8; 8] = [27, 1, 48, 22, 180, 63, 118, 217];
    pub const MIGRATION_DAMM_V2: [u8; 8] = [156, 169, 230, 103, 53, 228, 80, 64];
}

pub const ROUTES: &[EventRoute] = &[
    EventRoute {
        name: "swap",
        discriminators: &[&discriminators::SWAP, &discriminators::SWAP2],
        decode: decode_swap,
    },
    EventRoute {
        name: "initialize_virtual_pool",
        discriminators: &[&discriminators::INITIALIZE_SPL, &discriminators::INITIALIZE_TOKEN_2022],
        decode: decode_initialize,
    },
    EventRoute {
        name: "migrate_meteora_damm",
        discriminators: &[&discriminators::MIGRATE_METEORA_DAMM],
        decode: decode_migrate_damm,
    },
    EventRoute {
        name: "migration_damm_v2",
        discriminators: &[&discriminators::MIGRATION_DAMM_V2],
        decode: decode_migrate_damm_v2,
    },
];

/// 输入账户是否持有 base mint
fn input_is_base(
    ctx: &DecodeContext<'_>,
    input_account: &Pubkey,
    output_account: &Pubkey,
    base_mint: &Pubkey,
) -> bool {
    if let Some(info) = ctx.adapter.token_account_info(input_account) {
        return info.mint == *base_mint;
    }
    if let Some(info) = ctx.adapter.token_account_info(output_account) {
        return info.mint != *base_mint;
    }
    let signer = ctx.signer();
    [TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID]
        .iter()
        .any(|program| associated_token_address(&signer, base_mint, program) == *input_account)
}

fn pick<'t, F>(transfers: &'t [TransferRecord], fallback: usize, predicate: F) -> &'t TransferRecord
where
    F: Fn(&TransferRecord) -> bool,
{
    transfers.iter().find(|t| predicate(t)).unwrap_or(&transfers[fallback])
}

/// swap(amount_in, minimum_amount_out) / swap2(amount_0, amount_1, swap_mode)
///
/// Account indices: 2: pool, 3: input_token_account, 4: output_token_account,
/// 7: base_mint, 8: quote_mint, 9: payer
fn decode_swap(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let pool = ctx.account(2)?;
    let input_account = ctx.account(3)?;
    let output_account = ctx.account(4)?;
    let base_mint = ctx.account(7)?;
    let quote_mint = ctx.account(8)?;
    let payer = ctx.account(9)?;

    let transfers = ctx.require_transfers(2)?;
    let input = pick(transfers, 0, |t| t.source == input_account);
    let output = pick(transfers, 1, |t| t.destination == output_account);
    if input.mint == output.mint {
        return Err(DecodeError::SameMintTrade { mint: input.mint });
    }

    let event_type = if input_is_base(ctx, &input_account, &output_account, &base_mint) {
        MemeEventType::Sell
    } else {
        MemeEventType::Buy
    };

    Ok(Some(MemeEvent {
        base_mint: Some(base_mint),
        quote_mint: Some(quote_mint),
        user: Some(payer),
        pool: Some(pool),
        bonding_curve: Some(pool),
        input_token: Some(input.token_amount()),
        output_token: Some(output.token_amount()),
        ..ctx.event(event_type)
    }))
}

/// initialize_virtual_pool_with_spl_token / _with_token2022 (name, symbol, uri)
///
/// Account indices: 2: creator, 3: base_mint, 4: quote_mint, 5: pool
fn decode_initialize(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let name = reader.read_string()?;
    let symbol = reader.read_string()?;
    let uri = reader.read_string()?;
    let creator = ctx.account(2)?;

    Ok(Some(MemeEvent {
        base_mint: Some(ctx.account(3)?),
        quote_mint: Some(ctx.account(4)?),
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

fn migrate_event(
    ctx: &DecodeContext<'_>,
    base_index: usize,
    quote_index: usize,
) -> DecodeResult<Option<MemeEvent>> {
    Ok(Some(MemeEvent {
        bonding_curve: Some(ctx.account(0)?),
        pool: Some(ctx.account(4)?),
        base_mint: Some(ctx.account(base_index)?),
        quote_mint: Some(ctx.account(quote_index)?),
        user: Some(ctx.signer()),
        ..ctx.event(MemeEventType::Migrate)
    }))
}

/// Account indices: 0: virtual_pool, 4: damm pool, 7: base_mint, 8: quote_mint
fn decode_migrate_damm(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    migrate_event(ctx, 7, 8)
}

/// Account indices: 0: virtual_pool, 4: damm v2 pool, 13: base_mint, 14: quote_mint
fn decode_migrate_damm_v2(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    migrate_event(ctx, 13, 14)
}
