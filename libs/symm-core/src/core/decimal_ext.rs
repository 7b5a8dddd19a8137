use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits kept for quantities and quotes.
pub const AMOUNT_SCALE: u32 = 8;

/// Operand conversion used by the `safe!` macro.
///
/// Allows mixing plain and optional decimals in one checked expression.
pub trait DecimalExt {
    fn checked_operand(&self) -> Option<Decimal>;
}

impl DecimalExt for Decimal {
    fn checked_operand(&self) -> Option<Decimal> {
        Some(*self)
    }
}

impl DecimalExt for Option<Decimal> {
    fn checked_operand(&self) -> Option<Decimal> {
        *self
    }
}

/// Round half to even at given scale.
pub fn round_to_scale(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven)
}

/// Round down (towards zero) at given scale.
pub fn floor_to_scale(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}
