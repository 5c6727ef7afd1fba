//! PumpFun 事件解析器
//!
//! PumpFun 通过 Anchor `emit_cpi!` 把事件写成自调用内层指令，
//! 判别码为 16 字节：8 字节 CPI 前缀 + 8 字节事件标签。
//! 事件数据是链上权威记录，数量与精度直接可信。

use solana_sdk::pubkey::Pubkey;

use crate::core::error::DecodeResult;
use crate::core::events::{FeeComponent, FeeType, MemeEvent, MemeEventType, TokenAmount};
use crate::core::reader::BinaryReader;
use crate::instr::program_ids::{PUMPFUN_PROGRAM_ID, WSOL_MINT};
use crate::instr::utils::event_discriminator;
use crate::instr::{DecodeContext, EventRoute};

/// PumpFun 代币固定 6 位精度
pub const PUMPFUN_TOKEN_DECIMALS: u8 = 6;

/// TradeEvent 核心字段之后剩余字节达到该值时，才存在扩展块（储备 / 手续费 / 创建者费用）
pub const TRADE_EXTENSION_MIN_LEN: usize = 52;

/// PumpFun discriminator 常量
pub mod discriminators {
    use super::event_discriminator;

    // 指令
    pub const CREATE: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
    pub const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
    pub const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];

    // 事件
    pub const TRADE_EVENT: [u8; 16] = event_discriminator([189, 219, 127, 211, 78, 230, 97, 238]);
    pub const CREATE_EVENT: [u8; 16] = event_discriminator([27, 114, 169, 77, 222, 235, 99, 118]);
    pub const COMPLETE_EVENT: [u8; 16] = event_discriminator([95, 114, 97, 156, 212, 46, 152, 8]);
    pub const MIGRATE_EVENT: [u8; 16] = event_discriminator([189, 233, 93, 185, 92, 148, 234, 148]);
}

pub const ROUTES: &[EventRoute] = &[
    EventRoute { name: "TradeEvent", discriminators: &[&discriminators::TRADE_EVENT], decode: decode_trade },
    EventRoute { name: "CreateEvent", discriminators: &[&discriminators::CREATE_EVENT], decode: decode_create },
    EventRoute { name: "CompleteEvent", discriminators: &[&discriminators::COMPLETE_EVENT], decode: decode_complete },
    EventRoute {
        name: "CompletePumpAmmMigrationEvent",
        discriminators: &[&discriminators::MIGRATE_EVENT],
        decode: decode_migrate,
    },
];

/// TradeEvent 扩展块
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradeExtension {
    pub real_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub fee_recipient: Pubkey,
    pub fee_basis_points: u64,
    pub fee: u64,
    pub creator: Option<Pubkey>,
    pub creator_fee_basis_points: u64,
    pub creator_fee: u64,
}

impl TradeExtension {
    fn read(reader: &mut BinaryReader<'_>) -> DecodeResult<Option<Self>> {
        if reader.remaining() < TRADE_EXTENSION_MIN_LEN {
            return Ok(None);
        }
        let mut ext = TradeExtension {
            real_sol_reserves: reader.read_u64()?,
            real_token_reserves: reader.read_u64()?,
            fee_recipient: reader.read_pubkey()?,
            ..Default::default()
        };
        if reader.remaining() >= 16 {
            ext.fee_basis_points = reader.read_u64()?;
            ext.fee = reader.read_u64()?;
        }
        if reader.remaining() >= 48 {
            ext.creator = Some(reader.read_pubkey()?);
            ext.creator_fee_basis_points = reader.read_u64()?;
            ext.creator_fee = reader.read_u64()?;
        }
        Ok(Some(ext))
    }
}

/// 外层 buy / sell 指令中的联合曲线账户（3: bonding_curve）
fn enclosing_bonding_curve(ctx: &DecodeContext<'_>) -> Option<Pubkey> {
    let parent = ctx.classifier.parent_of(&ctx.instruction, &PUMPFUN_PROGRAM_ID)?;
    if parent.starts_with(&discriminators::BUY) || parent.starts_with(&discriminators::SELL) {
        parent.accounts().get(3).copied()
    } else {
        None
    }
}

/// TradeEvent: mint, sol_amount, token_amount, is_buy, user, timestamp,
/// virtual_sol_reserves, virtual_token_reserves, [extension]
fn decode_trade(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let mint = reader.read_pubkey()?;
    let sol_amount = reader.read_u64()?;
    let token_amount = reader.read_u64()?;
    let is_buy = reader.read_bool()?;
    let user = reader.read_pubkey()?;
    let _timestamp = reader.read_i64()?;
    let _virtual_sol_reserves = reader.read_u64()?;
    let _virtual_token_reserves = reader.read_u64()?;
    let extension = TradeExtension::read(reader)?;

    let sol = TokenAmount::sol(sol_amount);
    let token = TokenAmount::with_decimals(mint, token_amount, PUMPFUN_TOKEN_DECIMALS);
    let (event_type, input_token, output_token) = if is_buy {
        (MemeEventType::Buy, sol, token)
    } else {
        (MemeEventType::Sell, token, sol)
    };

    let mut fees = Vec::new();
    if let Some(ext) = extension {
        fees.push(FeeComponent::new(FeeType::Protocol, WSOL_MINT, ext.fee).with_recipient(ext.fee_recipient));
        if let Some(creator) = ext.creator {
            fees.push(FeeComponent::new(FeeType::Creator, WSOL_MINT, ext.creator_fee).with_recipient(creator));
        }
    }

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        bonding_curve: enclosing_bonding_curve(ctx),
        creator: extension.and_then(|e| e.creator),
        input_token: Some(input_token),
        output_token: Some(output_token),
        fees,
        ..ctx.event(event_type)
    }))
}

/// CreateEvent: name, symbol, uri, mint, bonding_curve, user, [creator, ...]
fn decode_create(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let name = reader.read_string()?;
    let symbol = reader.read_string()?;
    let uri = reader.read_string()?;
    let mint = reader.read_pubkey()?;
    let bonding_curve = reader.read_pubkey()?;
    let user = reader.read_pubkey()?;
    let creator = if reader.remaining() >= 32 { reader.read_pubkey()? } else { user };

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        creator: Some(creator),
        bonding_curve: Some(bonding_curve),
        name: Some(name),
        symbol: Some(symbol),
        uri: Some(uri),
        ..ctx.event(MemeEventType::Create)
    }))
}

/// CompleteEvent: user, mint, bonding_curve, timestamp
fn decode_complete(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let user = reader.read_pubkey()?;
    let mint = reader.read_pubkey()?;
    let bonding_curve = reader.read_pubkey()?;

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        bonding_curve: Some(bonding_curve),
        ..ctx.event(MemeEventType::Complete)
    }))
}

/// CompletePumpAmmMigrationEvent: user, mint, mint_amount, sol_amount,
/// pool_migration_fee, bonding_curve, timestamp, pool
fn decode_migrate(reader: &mut BinaryReader<'_>, ctx: &DecodeContext<'_>) -> DecodeResult<Option<MemeEvent>> {
    let user = reader.read_pubkey()?;
    let mint = reader.read_pubkey()?;
    let mint_amount = reader.read_u64()?;
    let sol_amount = reader.read_u64()?;
    let pool_migration_fee = reader.read_u64()?;
    let bonding_curve = reader.read_pubkey()?;
    let _timestamp = reader.read_i64()?;
    let pool = reader.read_pubkey()?;

    Ok(Some(MemeEvent {
        base_mint: Some(mint),
        quote_mint: Some(WSOL_MINT),
        user: Some(user),
        bonding_curve: Some(bonding_curve),
        pool: Some(pool),
        // 迁移进新池的流动性
        input_token: Some(TokenAmount::with_decimals(mint, mint_amount, PUMPFUN_TOKEN_DECIMALS)),
        output_token: Some(TokenAmount::sol(sol_amount)),
        fees: vec![FeeComponent::new(FeeType::Protocol, WSOL_MINT, pool_migration_fee)],
        ..ctx.event(MemeEventType::Migrate)
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::adapter::fixtures::TxBuilder;
    use crate::core::error::DecodeError;
    use crate::instr::test_support::{decode_all, decode_first};
    use crate::instr::Protocol;

    pub struct TradeFields {
        pub mint: Pubkey,
        pub sol_amount: u64,
        pub token_amount: u64,
        pub is_buy: bool,
        pub user: Pubkey,
    }

    /// 核心字段 + 可选扩展（储备、手续费、创建者）
    pub fn trade_event_data(f: &TradeFields, fee_recipient: Option<Pubkey>, creator: Option<Pubkey>) -> Vec<u8> {
        let mut data = discriminators::TRADE_EVENT.to_vec();
        data.extend_from_slice(f.mint.as_ref());
        data.extend_from_slice(&f.sol_amount.to_le_bytes());
        data.extend_from_slice(&f.token_amount.to_le_bytes());
        data.push(f.is_buy as u8);
        data.extend_from_slice(f.user.as_ref());
        data.extend_from_slice(&1_700_000_000i64.to_le_bytes());
        data.extend_from_slice(&30_000_000_000u64.to_le_bytes());
        data.extend_from_slice(&1_073_000_000_000_000u64.to_le_bytes());
        if let Some(recipient) = fee_recipient {
            data.extend_from_slice(&10_000_000_000u64.to_le_bytes());
            data.extend_from_slice(&793_000_000_000_000u64.to_le_bytes());
            data.extend_from_slice(recipient.as_ref());
            data.extend_from_slice(&95u64.to_le_bytes());
            data.extend_from_slice(&(f.sol_amount / 100).to_le_bytes());
            if let Some(creator) = creator {
                data.extend_from_slice(creator.as_ref());
                data.extend_from_slice(&5u64.to_le_bytes());
                data.extend_from_slice(&0u64.to_le_bytes());
            }
        }
        data
    }

    fn buy_accounts(mint: Pubkey, curve: Pubkey, user: Pubkey) -> Vec<Pubkey> {
        vec![
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            mint,
            curve,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            user,
        ]
    }

    #[test]
    fn test_trade_event_with_extension() {
        let (mint, curve, user) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let (fee_recipient, creator) = (Pubkey::new_unique(), Pubkey::new_unique());
        let fields = TradeFields { mint, sol_amount: 2_000_000_000, token_amount: 70_000_000_000, is_buy: true, user };
        let adapter = TxBuilder::new(user)
            .instruction(PUMPFUN_PROGRAM_ID, buy_accounts(mint, curve, user), discriminators::BUY.to_vec())
            .inner(0, PUMPFUN_PROGRAM_ID, vec![], trade_event_data(&fields, Some(fee_recipient), Some(creator)))
            .build();

        let results = decode_all(Protocol::Pumpfun, &adapter);
        // 外层 buy 指令本身不在分发表中
        assert_eq!(results[0].0, Ok(None));
        let event = results[1].0.clone().unwrap().unwrap();
        assert_eq!(event.event_type, MemeEventType::Buy);
        assert_eq!(event.bonding_curve, Some(curve));
        assert_eq!(event.creator, Some(creator));
        assert_eq!(event.input_token.unwrap().ui_amount, Some(2.0));
        assert_eq!(event.output_token.unwrap().ui_amount, Some(70_000.0));
        assert_eq!(event.fees.len(), 2);
        assert_eq!(event.fees[0].amount_raw, 20_000_000);
        assert_eq!(event.fees[0].recipient, Some(fee_recipient));
        assert_eq!(event.metadata.idx.to_string(), "0-0");
    }

    #[test]
    fn test_legacy_trade_event_without_extension() {
        let (mint, user) = (Pubkey::new_unique(), Pubkey::new_unique());
        let fields = TradeFields { mint, sol_amount: 500_000_000, token_amount: 1_000_000, is_buy: false, user };
        let router = Pubkey::new_unique();
        let adapter = TxBuilder::new(user)
            .instruction(router, vec![], vec![])
            .inner(0, PUMPFUN_PROGRAM_ID, vec![], trade_event_data(&fields, None, None))
            .build();

        let event = decode_first(Protocol::Pumpfun, &adapter).unwrap().unwrap();
        assert_eq!(event.event_type, MemeEventType::Sell);
        assert!(event.fees.is_empty());
        assert_eq!(event.bonding_curve, None);
        assert_eq!(event.input_token.unwrap().mint, mint);
    }

    #[test]
    fn test_short_extension_is_ignored() {
        let (mint, user) = (Pubkey::new_unique(), Pubkey::new_unique());
        let fields = TradeFields { mint, sol_amount: 1, token_amount: 1, is_buy: true, user };
        let mut data = trade_event_data(&fields, None, None);
        data.extend_from_slice(&[0u8; TRADE_EXTENSION_MIN_LEN - 1]);
        let adapter = TxBuilder::new(user).instruction(PUMPFUN_PROGRAM_ID, vec![], data).build();

        let event = decode_first(Protocol::Pumpfun, &adapter).unwrap().unwrap();
        assert!(event.fees.is_empty());
    }

    #[test]
    fn test_truncated_trade_event_is_error() {
        let mut data = discriminators::TRADE_EVENT.to_vec();
        data.extend_from_slice(&[1u8; 40]);
        let user = Pubkey::new_unique();
        let adapter = TxBuilder::new(user).instruction(PUMPFUN_PROGRAM_ID, vec![], data).build();
        assert!(matches!(decode_first(Protocol::Pumpfun, &adapter), Err(DecodeError::OutOfBounds { .. })));
    }

    #[test]
    fn test_create_complete_and_migrate_events() {
        let (mint, curve, user, pool) =
            (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());

        let mut create = discriminators::CREATE_EVENT.to_vec();
        for s in ["Pepe", "PEPE", "https://pump.fun/pepe"] {
            create.extend_from_slice(&(s.len() as u32).to_le_bytes());
            create.extend_from_slice(s.as_bytes());
        }
        create.extend_from_slice(mint.as_ref());
        create.extend_from_slice(curve.as_ref());
        create.extend_from_slice(user.as_ref());

        let mut complete = discriminators::COMPLETE_EVENT.to_vec();
        complete.extend_from_slice(user.as_ref());
        complete.extend_from_slice(mint.as_ref());
        complete.extend_from_slice(curve.as_ref());
        complete.extend_from_slice(&0i64.to_le_bytes());

        let mut migrate = discriminators::MIGRATE_EVENT.to_vec();
        migrate.extend_from_slice(user.as_ref());
        migrate.extend_from_slice(mint.as_ref());
        migrate.extend_from_slice(&206_900_000_000_000u64.to_le_bytes());
        migrate.extend_from_slice(&84_990_000_000u64.to_le_bytes());
        migrate.extend_from_slice(&15_000_000u64.to_le_bytes());
        migrate.extend_from_slice(curve.as_ref());
        migrate.extend_from_slice(&0i64.to_le_bytes());
        migrate.extend_from_slice(pool.as_ref());

        let adapter = TxBuilder::new(user)
            .instruction(PUMPFUN_PROGRAM_ID, vec![], create)
            .instruction(PUMPFUN_PROGRAM_ID, vec![], complete)
            .instruction(PUMPFUN_PROGRAM_ID, vec![], migrate)
            .build();

        let events: Vec<MemeEvent> =
            decode_all(Protocol::Pumpfun, &adapter).into_iter().map(|(r, _)| r.unwrap().unwrap()).collect();
        assert_eq!(events[0].event_type, MemeEventType::Create);
        assert_eq!(events[0].creator, Some(user));
        assert_eq!(events[0].bonding_curve, Some(curve));
        assert_eq!(events[1].event_type, MemeEventType::Complete);
        assert_eq!(events[2].event_type, MemeEventType::Migrate);
        assert_eq!(events[2].pool, Some(pool));
        assert_eq!(events[2].output_token.as_ref().unwrap().ui_amount, Some(84.99));
        assert_eq!(events[2].fees[0].amount_raw, 15_000_000);
    }
}
