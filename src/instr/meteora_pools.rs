//! Meteora DLMM / DAMM / DAMM v2 池子解析器
//!
//! 这些程序没有可用的事件日志，交易完全由关联转账推断：
//! 不是流动性指令、且至少有两条转账的指令视为 swap；第三条转账视为手续费。

use solana_sdk::pubkey::Pubkey;

use crate::core::error::DecodeResult;
use crate::core::events::{FeeComponent, FeeType, MemeEvent, MemeEventType};
use crate::core::reader::BinaryReader;
use crate::instr::program_ids::{USDC_MINT, WSOL_MINT};
use crate::instr::{DecodeContext, EventRoute, Protocol};

/// 流动性相关 discriminator（DLMM / DAMM v1 / DAMM v2）
pub mod discriminators {
    pub const ADD_LIQUIDITY: [u8; 8] = [181, 157, 89, 67, 143, 182, 52, 72];
    pub const ADD_LIQUIDITY_BY_WEIGHT: [u8; 8] = [28, 140, 238, 99, 231, 162, 21, 149];
    pub const ADD_LIQUIDITY_BY_STRATEGY: [u8; 8] = [7, 3, 150, 127, 148, 40, 61, 200];
    pub const ADD_LIQUIDITY_ONE_SIDE: [u8; 8] = [94, 155, 103, 151, 70, 95, 220, 165];
    pub const ADD_LIQUIDITY_BY_STRATEGY_ONE_SIDE: [u8; 8] = [41, 5, 238, 175, 100, 225, 6, 205];
    pub const ADD_LIQUIDITY2: [u8; 8] = [228, 162, 78, 28, 70, 219, 116, 115];
    pub const ADD_LIQUIDITY_BY_STRATEGY2: [u8; 8] = [3, 221, 149, 218, 111, 141, 118, 213];
    pub const REMOVE_LIQUIDITY: [u8; 8] = [80, 85, 209, 72, 24, 206, 177, 108];
    pub const REMOVE_ALL_LIQUIDITY: [u8; 8] = [10, 51, 61, 35, 112, 105, 24, 85];
    pub const REMOVE_LIQUIDITY_BY_RANGE: [u8; 8] = [26, 82, 102, 152, 240, 74, 105, 26];
    pub const REMOVE_LIQUIDITY2: [u8; 8] = [230, 215, 82, 127, 241, 101, 227, 146];
    pub const REMOVE_BALANCE_LIQUIDITY: [u8; 8] = [133, 109, 44, 179, 56, 238, 114, 33];
    pub const ADD_BALANCE_LIQUIDITY: [u8; 8] = [168, 227, 50, 62, 189, 171, 84, 176];
    pub const ADD_IMBALANCE_LIQUIDITY: [u8; 8] = [79, 35, 122, 84, 173, 15, 93, 191];
    pub const BOOTSTRAP_LIQUIDITY: [u8; 8] = [4, 228, 215, 71, 225, 253, 119, 206];
    pub const CLAIM_FEE: [u8; 8] = [169, 32, 79, 137, 136, 232, 70, 137];
    pub const CLAIM_FEE2: [u8; 8] = [112, 191, 101, 171, 28, 144, 127, 187];
    pub const CLAIM_POSITION_FEE: [u8; 8] = [180, 38, 154, 17, 133, 33, 162, 211];
    pub const CLAIM_REWARD: [u8; 8] = [149, 95, 181, 242, 94, 90, 158, 162];
    pub const CLAIM_REWARD2: [u8; 8] = [190, 3, 127, 119, 178, 87, 157, 183];
    pub const CLAIM_PARTNER_FEE: [u8; 8] = [97, 206, 39, 105, 94, 94, 126, 148];
    pub const CLAIM_PROTOCOL_FEE: [u8; 8] = [165, 228, 133, 48, 99, 249, 255, 33];
    pub const WITHDRAW_PROTOCOL_FEE: [u8; 8] = [158, 201, 158, 189, 33, 93, 162, 103];
    pub const WITHDRAW_INELIGIBLE_REWARD: [u8; 8] = [148, 206, 42, 195, 247, 49, 103, 8];
    pub const FUND_REWARD: [u8; 8] = [188, 50, 249, 165, 93, 151, 38, 63];
}

/// 建池 / 仓位 discriminator（DLMM / DAMM v1 / DAMM v2）
pub mod setup_discriminators {
    pub const INITIALIZE: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];
    pub const INITIALIZE_POOL: [u8; 8] = [95, 180, 10, 172, 84, 174, 232, 40];
    pub const INITIALIZE_POOL_WITH_DYNAMIC_CONFIG: [u8; 8] = [149, 82, 72, 197, 253, 252, 68, 15];
    pub const INITIALIZE_CUSTOMIZABLE_POOL: [u8; 8] = [20, 161, 241, 24, 189, 221, 180, 2];
    pub const INITIALIZE_PERMISSIONLESS_POOL_WITH_CONFIG: [u8; 8] = [7, 166, 138, 171, 206, 171, 236, 244];
    pub const INITIALIZE_PERMISSIONLESS_POOL_WITH_CONFIG2: [u8; 8] = [48, 149, 220, 130, 61, 11, 9, 178];
    pub const INITIALIZE_LB_PAIR: [u8; 8] = [45, 154, 237, 210, 221, 15, 166, 92];
    pub const INITIALIZE_LB_PAIR2: [u8; 8] = [73, 59, 36, 120, 237, 83, 108, 198];
    pub const INITIALIZE_PERMISSION_LB_PAIR: [u8; 8] = [108, 102, 213, 85, 251, 3, 53, 21];
    pub const INITIALIZE_CUSTOMIZABLE_LB_PAIR: [u8; 8] = [46, 39, 41, 135, 111, 183, 200, 64];
    pub const INITIALIZE_CUSTOMIZABLE_LB_PAIR2: [u8; 8] = [243, 73, 129, 126, 51, 19, 241, 107];
    pub const INITIALIZE_BIN_ARRAY: [u8; 8] = [35, 86, 19, 185, 78, 212, 75, 211];
    pub const INITIALIZE_POSITION: [u8; 8] = [219, 192, 234, 71, 190, 191, 102, 80];
    pub const INITIALIZE_POSITION_PDA: [u8; 8] = [46, 82, 125, 146, 85, 141, 228, 153];
    pub const INITIALIZE_REWARD: [u8; 8] = [95, 135, 192, 196, 242, 129, 230, 68];
    pub const CREATE_POSITION: [u8; 8] = [48, 215, 197, 153, 96, 203, 180, 133];
    pub const CLOSE_POSITION: [u8; 8] = [123, 134, 81, 0, 49, 68, 98, 98];
    pub const SPLIT_POSITION: [u8; 8] = [172, 241, 221, 138, 161, 29, 253, 42];
    pub const SPLIT_POSITION2: [u8; 8] = [221, 147, 228, 207, 140, 212, 17, 119];
    pub const LOCK_POSITION: [u8; 8] = [227, 62, 2, 252, 247, 10, 171, 185];
    pub const PERMANENT_LOCK_POSITION: [u8; 8] = [165, 176, 125, 6, 231, 171, 186, 213];
    pub const CREATE_LOCK_ESCROW: [u8; 8] = [54, 87, 165, 19, 69, 227, 218, 224];
    pub const LOCK: [u8; 8] = [21, 19, 208, 43, 237, 62, 255, 87];
    pub const CREATE_CONFIG: [u8; 8] = [208, 127, 21, 1, 194, 190, 196, 70];
}

use discriminators::*;
use setup_discriminators::*;

/// 顺序敏感：非 swap 条目必须排在兜底的 swap 条目之前
pub const ROUTES: &[EventRoute] = &[
    EventRoute {
        name: "liquidity",
        discriminators: &[
            &ADD_LIQUIDITY,
            &ADD_LIQUIDITY_BY_WEIGHT,
            &ADD_LIQUIDITY_BY_STRATEGY,
            &ADD_LIQUIDITY_ONE_SIDE,
            &ADD_LIQUIDITY_BY_STRATEGY_ONE_SIDE,
            &ADD_LIQUIDITY2,
            &ADD_LIQUIDITY_BY_STRATEGY2,
            &REMOVE_LIQUIDITY,
            &REMOVE_ALL_LIQUIDITY,
            &REMOVE_LIQUIDITY_BY_RANGE,
            &REMOVE_LIQUIDITY2,
            &REMOVE_BALANCE_LIQUIDITY,
            &ADD_BALANCE_LIQUIDITY,
            &ADD_IMBALANCE_LIQUIDITY,
            &BOOTSTRAP_LIQUIDITY,
            &CLAIM_FEE,
            &CLAIM_FEE2,
            &CLAIM_POSITION_FEE,
            &CLAIM_REWARD,
            &CLAIM_REWARD2,
            &CLAIM_PARTNER_FEE,
            &CLAIM_PROTOCOL_FEE,
            &WITHDRAW_PROTOCOL_FEE,
            &WITHDRAW_INELIGIBLE_REWARD,
            &FUND_REWARD,
        ],
        decode: skip,
    },
    EventRoute {
        name: "setup",
        discriminators: &[
            &INITIALIZE,
            &INITIALIZE_POOL,
            &INITIALIZE_POOL_WITH_DYNAMIC_CONFIG,
            &INITIALIZE_CUSTOMIZABLE_POOL,
            &INITIALIZE_PERMISSIONLESS_POOL_WITH_CONFIG,
            &INITIALIZE_PERMISSIONLESS_POOL_WITH_CONFIG2,
            &INITIALIZE_LB_PAIR,
            &INITIALIZE_LB_PAIR2,
            &INITIALIZE_PERMISSION_LB_PAIR,
            &INITIALIZE_CUSTOMIZABLE_LB_PAIR,
            &INITIALIZE_CUSTOMIZABLE_LB_PAIR2,
            &INITIALIZE_BIN_ARRAY,
            &INITIALIZE_POSITION,
            &INITIALIZE_POSITION_PDA,
            &INITIALIZE_REWARD,
            &CREATE_POSITION,
            &CLOSE_POSITION,
            &SPLIT_POSITION,
            &SPLIT_POSITION2,
            &LOCK_POSITION,
            &PERMANENT_LOCK_POSITION,
            &CREATE_LOCK_ESCROW,
            &LOCK,
            &CREATE_CONFIG,
        ],
        decode: skip,
    },
    // 空前缀匹配所有剩余指令
    EventRoute { name: "swap", discriminators: &[&[]], decode: decode_swap },
];

fn skip(_reader: &mut BinaryReader<'_>, _ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    Ok(None)
}

/// 池子账户位置
fn pool_account_index(protocol: Protocol) -> usize {
    match protocol {
        Protocol::MeteoraDammV2 => 1,
        _ => 0,
    }
}

#[inline]
fn is_quote_mint(mint: &Pubkey) -> bool {
    *mint == WSOL_MINT || *mint == USDC_MINT
}

fn decode_swap(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let transfers = ctx.transfers();
    if transfers.len() < 2 {
        return Ok(None);
    }

    let signer = ctx.signer();
    let input = transfers
        .iter()
        .find(|t| t.source_owner == Some(signer))
        .unwrap_or(&transfers[0]);
    let Some(output) = transfers.iter().find(|t| t.mint != input.mint) else {
        log::debug!("{} {} has {} transfers of a single mint", ctx.protocol, ctx.idx(), transfers.len());
        return Ok(None);
    };

    let (base_mint, quote_mint) = if is_quote_mint(&input.mint) {
        (output.mint, input.mint)
    } else {
        (input.mint, output.mint)
    };

    let fees = transfers
        .get(2)
        .map(|fee| {
            let component = FeeComponent::new(FeeType::Dex, fee.mint, fee.amount_raw);
            vec![match fee.destination_owner {
                Some(recipient) => component.with_recipient(recipient),
                None => component,
            }]
        })
        .unwrap_or_default();

    Ok(Some(MemeEvent {
        pool: Some(ctx.account(pool_account_index(ctx.protocol))?),
        base_mint: Some(base_mint),
        quote_mint: Some(quote_mint),
        user: Some(signer),
        input_token: Some(input.token_amount()),
        output_token: Some(output.token_amount()),
        fees,
        ..ctx.event(MemeEventType::Trade)
    }))
}
