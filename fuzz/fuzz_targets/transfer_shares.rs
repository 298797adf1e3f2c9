#![no_main]

use alloy_primitives::U256;
use libfuzzer_sys::fuzz_target;
use reflect_math::invariants::{
    check_deliver, check_transfer, check_transfer_all, CheckLevel, DeliverInput, TransferAllInput,
    TransferInput,
};
use reflect_math::{Balance, BasisPoints, ReflectError, Shares, BASIS};

fn word(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn part(whole: U256, of: u64) -> U256 {
    whole * U256::from(of) / U256::from(u64::MAX)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 42 {
        return;
    }
    let fee = BasisPoints::new((word(&data[0..2]) % (BASIS as u64 + 1)) as u16).unwrap();
    let supply = U256::from(word(&data[2..10]).max(1));
    let total = (U256::from(word(&data[10..18])) << 64) | U256::from(word(&data[18..26]));
    let from = part(total, word(&data[26..34]));
    let to = part(total - from, word(&data[34..42]));

    if total.is_zero() {
        let r = TransferAllInput {
            fee_rate: fee,
            total_supply: Balance::new(supply),
            total_shares: Shares::ZERO,
            from_shares: Shares::ZERO,
            to_shares: Shares::ZERO,
        }
        .apply();
        assert!(matches!(r, Err(ReflectError::DivisionByZero(_))));
        return;
    }

    // Any affordable amount must convert and conserve shares, whatever the granularity.
    let from_balance = from * supply / total;
    let amount = part(from_balance, word(data.get(42..50).unwrap_or(&[0xff; 8])));

    let input = TransferInput {
        amount: Balance::new(amount),
        fee_rate: fee,
        total_supply: Balance::new(supply),
        total_shares: Shares::new(total),
        from_shares: Shares::new(from),
        to_shares: Shares::new(to),
    };
    let out = input.apply().unwrap();
    check_transfer(&input, &out, CheckLevel::Conservation).unwrap();

    let all = TransferAllInput {
        fee_rate: fee,
        total_supply: input.total_supply,
        total_shares: input.total_shares,
        from_shares: input.from_shares,
        to_shares: input.to_shares,
    };
    let out = all.apply().unwrap();
    check_transfer_all(&all, &out, CheckLevel::Conservation).unwrap();

    let deliver = DeliverInput {
        amount: input.amount,
        total_supply: input.total_supply,
        total_shares: input.total_shares,
        from_shares: input.from_shares,
    };
    let out = deliver.apply().unwrap();
    check_deliver(&deliver, &out, CheckLevel::Conservation).unwrap();
});
