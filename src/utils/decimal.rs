//! Decimal arithmetic utilities for prices and contract quantities.

use rust_decimal::Decimal;

/// Round to tick size (e.g., 0.01 for most prices).
pub fn round_to_tick(value: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size == Decimal::ZERO {
        return value;
    }
    (value / tick_size).round() * tick_size
}

/// Round down to lot size (e.g. a multiple of the leg count).
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size == Decimal::ZERO {
        return value;
    }
    (value / lot_size).floor() * lot_size
}

/// Split `total` into batches of `chunk`; the last batch takes any remainder.
pub fn chunks(total: Decimal, chunk: Decimal) -> Vec<Decimal> {
    let mut out = Vec::new();
    if chunk <= Decimal::ZERO {
        return out;
    }
    let mut remaining = total;
    while remaining > Decimal::ZERO {
        let next = remaining.min(chunk);
        out.push(next);
        remaining -= next;
    }
    out
}
