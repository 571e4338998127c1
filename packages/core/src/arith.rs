//! Numeric helpers for `add`/`subtract`.

use serde_json::{Number, Value};

/// Convert an amount to a JSON number, keeping integral amounts integral.
pub fn amount_value(amount: f64) -> Value {
    match as_integer(amount) {
        Some(i) => Value::from(i),
        None => Number::from_f64(amount)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

/// Add `amount` to `current`.
///
/// A missing or non-numeric `current` counts as zero. Integer arithmetic is
/// kept while both operands are integral and the sum fits in an `i64`.
pub fn add(current: Option<&Value>, amount: f64) -> Value {
    let base = match current {
        Some(Value::Number(n)) => n,
        _ => return amount_value(amount),
    };

    if let (Some(a), Some(b)) = (base.as_i64(), as_integer(amount)) {
        if let Some(sum) = a.checked_add(b) {
            return Value::from(sum);
        }
    }

    let sum = base.as_f64().unwrap_or(0.0) + amount;
    amount_value(sum)
}

fn as_integer(amount: f64) -> Option<i64> {
    if amount.fract() == 0.0 && amount >= i64::MIN as f64 && amount < i64::MAX as f64 {
        Some(amount as i64)
    } else {
        None
    }
}
