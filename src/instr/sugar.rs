//! Sugar 指令解析器
//!
//! 买卖指令在两个 u64 数量前有 2 字节字段；代币精度默认 6，
//! 由合成器的 mint 精度查询修正。

use crate::core::error::DecodeResult;
use crate::core::events::{MemeEvent, MemeEventType, TokenAmount};
use crate::core::reader::BinaryReader;
use crate::instr::program_ids::WSOL_MINT;
use crate::instr::{DecodeContext, EventRoute};

/// Sugar 代币默认精度
pub const SUGAR_DEFAULT_DECIMALS: u8 = 6;

/// Sugar discriminator 常量
pub mod discriminators {
    pub const BUY_EXACT_IN: [u8; 8] = [250, 234, 13, 123, 213, 156, 19, 236];
    pub const BUY_EXACT_OUT: [u8; 8] = [24, 211, 116, 40, 105, 3, 153, 56];
    pub const SELL_EXACT_IN: [u8; 8] = [149, 39, 222, 155, 211, 124, 152, 26];
    pub const SELL_EXACT_OUT: [u8; 8] = [95, 200, 71, 34, 8, 9, 11, 166];
    pub const CREATE: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
    pub const MIGRATE: [u8; 8] = [155, 234, 231, 146, 236, 158, 162, 30];
}

pub const ROUTES: &[EventRoute] = &[
    EventRoute {
        name: "buy",
        discriminators: &[&discriminators::BUY_EXACT_IN, &discriminators::BUY_EXACT_OUT],
        decode: decode_buy,
    },
    EventRoute {
        name: "sell",
        discriminators: &[&discriminators::SELL_EXACT_IN, &discriminators::SELL_EXACT_OUT],
        decode: decode_sell,
    },
    EventRoute { name: "create", discriminators: &[&discriminators::CREATE], decode: decode_create },
    EventRoute { name: "migrate", discriminators: &[&discriminators::MIGRATE], decode: decode_migrate },
];

/// 跳过 2 字节字段后的两个数量
fn read_amounts(reader: &mut BinaryReader<'_>) -> DecodeResult<(u64, u64)> {
    reader.skip(2)?;
    Ok((reader.read_u64()?, reader.read_u64()?))
}

/// (sol_amount, token_amount)
///
/// Account indices: 0: user, 2: bonding_curve, 3: mint
fn decode_buy(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let (sol_amount, token_amount) = read_amounts(reader)?;
    let mint = ctx.account(3)?;

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(ctx.account(0)?),
        bonding_curve: Some(ctx.account(2)?),
        input_token: Some(TokenAmount::sol(sol_amount)),
        output_token: Some(TokenAmount::hinted(mint, token_amount, SUGAR_DEFAULT_DECIMALS)),
        ..ctx.event(MemeEventType::Buy)
    }))
}

/// (token_amount, sol_amount)
///
/// Account indices: 0: user, 2: bonding_curve, 3: mint
fn decode_sell(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let (token_amount, sol_amount) = read_amounts(reader)?;
    let mint = ctx.account(3)?;

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(ctx.account(0)?),
        bonding_curve: Some(ctx.account(2)?),
        input_token: Some(TokenAmount::hinted(mint, token_amount, SUGAR_DEFAULT_DECIMALS)),
        output_token: Some(TokenAmount::sol(sol_amount)),
        ..ctx.event(MemeEventType::Sell)
    }))
}

/// create(name, symbol, uri)
///
/// Account indices: 0: creator, 1: mint, 2: bonding_curve
fn decode_create(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let name = reader.read_string()?;
    let symbol = reader.read_string()?;
    let uri = reader.read_string()?;
    let creator = ctx.account(0)?;

    Ok(Some(MemeEvent {
        base_mint: Some(ctx.account(1)?),
        quote_mint: Some(WSOL_MINT),
        bonding_curve: Some(ctx.account(2)?),
        user: Some(creator),
        creator: Some(creator),
        name: Some(name),
        symbol: Some(symbol),
        uri: Some(uri),
        ..ctx.event(MemeEventType::Create)
    }))
}

/// Account indices: 0: payer, 1: mint, 2: bonding_curve, 3: pool
fn decode_migrate(_reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    Ok(Some(MemeEvent {
        base_mint: Some(ctx.account(1)?),
        quote_mint: Some(WSOL_MINT),
        bonding_curve: Some(ctx.account(2)?),
        pool: Some(ctx.account(3)?),
        user: Some(ctx.account(0)?),
        ..ctx.event(MemeEventType::Migrate)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapter::fixtures::TxBuilder;
    use crate::core::error::DecodeError;
    use crate::instr::program_ids::SUGAR_PROGRAM_ID;
    use crate::instr::test_support::decode_first;
    use crate::instr::Protocol;
    use solana_sdk::pubkey::Pubkey;

    fn trade_data(discriminator: [u8; 8], first: u64, second: u64) -> Vec<u8> {
        let mut data = discriminator.to_vec();
        data.extend_from_slice(&[0xAA, 0xBB]);
        data.extend_from_slice(&first.to_le_bytes());
        data.extend_from_slice(&second.to_le_bytes());
        data
    }

    #[test]
    fn test_buy_skips_two_bytes() {
        let accounts: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let adapter = TxBuilder::new(accounts[0])
            .instruction(SUGAR_PROGRAM_ID, accounts.clone(), trade_data(discriminators::BUY_EXACT_IN, 250_000_000, 9_000_000))
            .build();

        let event = decode_first(Protocol::Sugar, &adapter).unwrap().unwrap();
        assert_eq!(event.event_type, MemeEventType::Buy);
        assert_eq!(event.input_token.unwrap().ui_amount, Some(0.25));
        let output = event.output_token.unwrap();
        assert_eq!(output.mint, accounts[3]);
        assert_eq!(output.amount_raw, 9_000_000);
        assert_eq!(output.decimals, Some(SUGAR_DEFAULT_DECIMALS));
        assert_eq!(output.ui_amount, None);
    }

    #[test]
    fn test_sell_amount_order() {
        let accounts: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let adapter = TxBuilder::new(accounts[0])
            .instruction(SUGAR_PROGRAM_ID, accounts.clone(), trade_data(discriminators::SELL_EXACT_OUT, 4_000_000, 100_000_000))
            .build();

        let event = decode_first(Protocol::Sugar, &adapter).unwrap().unwrap();
        assert_eq!(event.event_type, MemeEventType::Sell);
        assert_eq!(event.input_token.unwrap().amount_raw, 4_000_000);
        assert_eq!(event.output_token.unwrap().amount_raw, 100_000_000);
    }

    #[test]
    fn test_missing_accounts_error() {
        let user = Pubkey::new_unique();
        let adapter = TxBuilder::new(user)
            .instruction(SUGAR_PROGRAM_ID, vec![user], trade_data(discriminators::BUY_EXACT_OUT, 1, 1))
            .build();
        assert_eq!(
            decode_first(Protocol::Sugar, &adapter),
            Err(DecodeError::MissingAccount { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_create_reads_metadata_and_accounts() {
        let (creator, mint, curve) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let mut data = discriminators::CREATE.to_vec();
        for s in ["Sugar Cat", "SCAT", "https://sugar.example/scat.json"] {
            data.extend_from_slice(&(s.len() as u32).to_le_bytes());
            data.extend_from_slice(s.as_bytes());
        }
        let adapter = TxBuilder::new(creator)
            .instruction(SUGAR_PROGRAM_ID, vec![creator, mint, curve, Pubkey::new_unique()], data)
            .build();

        let event = decode_first(Protocol::Sugar, &adapter).unwrap().unwrap();
        assert_eq!(event.event_type, MemeEventType::Create);
        assert_eq!(event.base_mint, Some(mint));
        assert_eq!(event.quote_mint, Some(WSOL_MINT));
        assert_eq!(event.bonding_curve, Some(curve));
        assert_eq!(event.creator, Some(creator));
        assert_eq!(event.user, Some(creator));
        assert_eq!(event.name.as_deref(), Some("Sugar Cat"));
        assert_eq!(event.symbol.as_deref(), Some("SCAT"));
        assert_eq!(event.uri.as_deref(), Some("https://sugar.example/scat.json"));
    }

    #[test]
    fn test_create_truncated_uri_is_error() {
        let creator = Pubkey::new_unique();
        let mut data = discriminators::CREATE.to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.push(b'A');
        data.extend_from_slice(&1u32.to_le_bytes());
        data.push(b'B');
        data.extend_from_slice(&10u32.to_le_bytes());
        data.extend_from_slice(b"abc");
        let adapter = TxBuilder::new(creator)
            .instruction(SUGAR_PROGRAM_ID, vec![creator, Pubkey::new_unique(), Pubkey::new_unique()], data)
            .build();
        assert_eq!(
            decode_first(Protocol::Sugar, &adapter),
            Err(DecodeError::OutOfBounds { needed: 10, remaining: 3 })
        );
    }

    #[test]
    fn test_migrate_accounts() {
        let accounts: Vec<Pubkey> = (0..6).map(|_| Pubkey::new_unique()).collect();
        let adapter = TxBuilder::new(accounts[0])
            .instruction(SUGAR_PROGRAM_ID, accounts.clone(), discriminators::MIGRATE.to_vec())
            .build();

        let event = decode_first(Protocol::Sugar, &adapter).unwrap().unwrap();
        assert_eq!(event.event_type, MemeEventType::Migrate);
        assert_eq!(event.user, Some(accounts[0]));
        assert_eq!(event.base_mint, Some(accounts[1]));
        assert_eq!(event.bonding_curve, Some(accounts[2]));
        assert_eq!(event.pool, Some(accounts[3]));
        assert_eq!(event.quote_mint, Some(WSOL_MINT));
    }
}
