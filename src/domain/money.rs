use crate::error::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Digits after the point in every amount written out.
pub const SCALE: u32 = 2;

/// A monetary amount, used for subtotals and totals.
///
/// Wraps `rust_decimal::Decimal` so that amounts never go through floating point.
/// Arithmetic is checked: an amount that no longer fits is an
/// [`ValidationError::AmountTooLarge`], never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(pub Decimal);

/// The price of one unit of a product.
///
/// Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

/// A number of units on a cart or sale line. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, rhs: Money) -> Result<Self, ValidationError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(ValidationError::AmountTooLarge)
    }

    /// Sum of `amounts`, failing on the first overflow.
    pub fn total<I: IntoIterator<Item = Money>>(amounts: I) -> Result<Self, ValidationError> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, Money::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        two_places(self, serializer)
    }
}

/// Writes an amount rounded and padded to [`SCALE`] places, so `0` is `"0.00"`
/// and `25.0` is `"25.00"`.
pub fn two_places<T, S>(amount: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Copy + Into<Decimal>,
    S: Serializer,
{
    let mut value = (*amount).into().round_dp(SCALE);
    value.rescale(SCALE);
    Serialize::serialize(&value, serializer)
}

impl Price {
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ValidationError::MustBePositive { field: "price" })
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    pub fn times(&self, quantity: Quantity) -> Result<Money, ValidationError> {
        self.0
            .checked_mul(Decimal::from(quantity.value()))
            .map(Money)
            .ok_or(ValidationError::AmountTooLarge)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl From<Price> for Money {
    fn from(price: Price) -> Self {
        Self(price.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Quantity {
    pub fn new(requested: i64) -> Result<Self, ValidationError> {
        if requested <= 0 {
            return Err(ValidationError::NonPositiveQuantity { requested });
        }
        u32::try_from(requested)
            .map(Self)
            .map_err(|_| ValidationError::QuantityTooLarge { requested })
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Merges another amount of the same product into this one.
    pub fn checked_add(self, other: Quantity) -> Result<Self, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ValidationError::QuantityTooLarge {
                requested: i64::from(self.0) + i64::from(other.0),
            })
    }
}

impl TryFrom<i64> for Quantity {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_validation() {
        assert!(Price::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Price::new(dec!(0)),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(Price::new(dec!(-3.5)).is_err());
    }

    #[test]
    fn test_quantity_validation() {
        assert_eq!(Quantity::new(2).unwrap().value(), 2);
        assert_eq!(
            Quantity::new(0),
            Err(ValidationError::NonPositiveQuantity { requested: 0 })
        );
        assert_eq!(
            Quantity::new(-1),
            Err(ValidationError::NonPositiveQuantity { requested: -1 })
        );
        assert!(matches!(
            Quantity::new(i64::from(u32::MAX) + 1),
            Err(ValidationError::QuantityTooLarge { .. })
        ));
    }

    #[test]
    fn test_quantity_merge_overflow() {
        let big = Quantity::new(i64::from(u32::MAX)).unwrap();
        let one = Quantity::new(1).unwrap();
        assert!(big.checked_add(one).is_err());
        assert_eq!(one.checked_add(one).unwrap().value(), 2);
    }

    #[test]
    fn test_line_arithmetic() {
        let price = Price::new(dec!(12.50)).unwrap();
        let subtotal = price.times(Quantity::new(2).unwrap()).unwrap();
        assert_eq!(subtotal, Money::new(dec!(25.00)));

        let total = Money::total([subtotal, Money::new(dec!(0.99))]).unwrap();
        assert_eq!(total, Money::new(dec!(25.99)));
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_amount_overflow_is_an_error() {
        let huge = Price::new(Decimal::MAX).unwrap();
        assert_eq!(
            huge.times(Quantity::new(2).unwrap()),
            Err(ValidationError::AmountTooLarge)
        );
        assert_eq!(
            Money::total([Money::new(Decimal::MAX), Money::new(dec!(1))]),
            Err(ValidationError::AmountTooLarge)
        );
        assert_eq!(Money::total(Vec::new()), Ok(Money::ZERO));
    }

    #[test]
    fn test_amounts_serialize_with_two_places() {
        assert_eq!(serde_json::to_string(&Money::ZERO).unwrap(), "\"0.00\"");

        let subtotal = Price::new(dec!(12.5))
            .unwrap()
            .times(Quantity::new(2).unwrap())
            .unwrap();
        assert_eq!(serde_json::to_string(&subtotal).unwrap(), "\"25.00\"");

        let mut out = serde_json::Serializer::new(Vec::new());
        two_places(&Price::new(dec!(4.2)).unwrap(), &mut out).unwrap();
        assert_eq!(out.into_inner(), b"\"4.20\"");
    }

    #[test]
    fn test_price_deserialization_rejects_zero() {
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
        let price: Price = serde_json::from_str("\"4.20\"").unwrap();
        assert_eq!(price.value(), dec!(4.20));
    }
}
