//! Currency-aware monetary arithmetic.
//!
//! Every amount the engine persists or compares goes through [`round`], which
//! rounds half-up to the currency's canonical number of fractional digits.
//! Comparing amounts any other way is incorrect: intermediate calculations
//! may carry representation noise beyond the currency scale.

use crate::error::PaymentError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Canonical fractional digits for an ISO 4217 currency code.
///
/// Unrecognized codes are an error rather than a silent default.
pub fn currency_scale(code: &str) -> Result<u32, PaymentError> {
    match code {
        "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
        | "UGX" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => Ok(0),
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => Ok(3),
        "AED" | "ARS" | "AUD" | "BRL" | "CAD" | "CHF" | "CNY" | "COP" | "CZK" | "DKK"
        | "EGP" | "EUR" | "GBP" | "HKD" | "HUF" | "IDR" | "ILS" | "INR" | "MXN" | "MYR"
        | "NGN" | "NOK" | "NZD" | "PEN" | "PHP" | "PKR" | "PLN" | "RON" | "RUB" | "SAR"
        | "SEK" | "SGD" | "THB" | "TRY" | "TWD" | "USD" | "UYU" | "ZAR" => Ok(2),
        other => Err(PaymentError::InvalidCurrency(other.to_string())),
    }
}

/// Round an amount half-up to the currency's canonical scale.
pub fn round(amount: Decimal, currency: &str) -> Result<Decimal, PaymentError> {
    let scale = currency_scale(currency)?;
    Ok(amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
}

/// Amount plus tax at the given percentage rate, rounded.
pub fn with_tax(amount: Decimal, rate_percent: Decimal, currency: &str) -> Result<Decimal, PaymentError> {
    round(amount + amount * rate_percent / Decimal::ONE_HUNDRED, currency)
}

/// The tax portion alone at the given percentage rate, rounded.
pub fn tax_amount(amount: Decimal, rate_percent: Decimal, currency: &str) -> Result<Decimal, PaymentError> {
    round(amount * rate_percent / Decimal::ONE_HUNDRED, currency)
}

/// A percentage of an amount, rounded.
pub fn percentage(amount: Decimal, percent: Decimal, currency: &str) -> Result<Decimal, PaymentError> {
    round(amount * percent / Decimal::ONE_HUNDRED, currency)
}

/// Compare two amounts at the currency's scale.
///
/// This is the only correct way to compare monetary values across the engine.
pub fn equal(a: Decimal, b: Decimal, currency: &str) -> Result<bool, PaymentError> {
    Ok(round(a, currency)? == round(b, currency)?)
}
