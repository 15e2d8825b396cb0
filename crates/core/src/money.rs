//! Money arithmetic.
//!
//! Monetary values are exact decimals; quantities are whole units.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Monetary amount (currency-agnostic, exact decimal).
pub type Amount = Decimal;

/// `quantity × unit_price`, failing instead of overflowing.
pub fn line_amount(quantity: i64, unit_price: Amount) -> DomainResult<Amount> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| DomainError::validation("line amount overflows"))
}

/// Checked sum over amounts.
pub fn checked_sum<I>(amounts: I) -> DomainResult<Amount>
where
    I: IntoIterator<Item = Amount>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, a| {
        acc.checked_add(a)
            .ok_or_else(|| DomainError::validation("amount total overflows"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_amount_is_exact() {
        assert_eq!(line_amount(3, dec!(0.10)).unwrap(), dec!(0.30));
        assert_eq!(line_amount(5, dec!(10)).unwrap(), dec!(50));
    }

    #[test]
    fn overflow_is_a_validation_error() {
        let err = line_amount(i64::MAX, Decimal::MAX).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn checked_sum_adds_all_amounts() {
        assert_eq!(checked_sum([dec!(1.5), dec!(2.25), dec!(0)]).unwrap(), dec!(3.75));
        assert_eq!(checked_sum(Vec::<Amount>::new()).unwrap(), Decimal::ZERO);
    }
}
