//! Shell-style argument handling for chat commands.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};

/// Decimal literals accepted as numbers: optional sign, digits with an
/// optional fraction (or a bare fraction), optional lowercase exponent.
static DECIMAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:e[-+]?\d+)?$").expect("Invalid decimal regex")
});

/// Hexadecimal literals (`0x1f`), unsigned only.
static HEX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0[xX][0-9a-fA-F]+$").expect("Invalid hex regex"));

/// Split command text into arguments, honoring quotes and escapes.
pub fn tokenize(text: &str) -> Result<Vec<String>, shell_words::ParseError> {
    shell_words::split(text)
}

/// Convert one argument to JSON: numeric literals become numbers, anything
/// else a string.
///
/// Integers that fit `i64` (or `u64` for hex) stay integral. A literal whose
/// value is not a finite JSON number (`1e400`) stays a string.
pub fn to_value(arg: &str) -> Value {
    if HEX_REGEX.is_match(arg) {
        return match u64::from_str_radix(&arg[2..], 16) {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(arg.to_string()),
        };
    }
    if !DECIMAL_REGEX.is_match(arg) {
        return Value::String(arg.to_string());
    }
    if let Ok(n) = arg.parse::<i64>() {
        return Value::Number(n.into());
    }
    match arg.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(arg.to_string()),
    }
}

/// Convert every argument with [`to_value`].
pub fn to_values<S: AsRef<str>>(args: &[S]) -> Vec<Value> {
    args.iter().map(|a| to_value(a.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"run greet "John Doe" 'x y' z\ w"#).unwrap(),
            vec!["run", "greet", "John Doe", "x y", "z w"]
        );
    }

    #[test]
    fn test_tokenize_unbalanced() {
        assert!(tokenize(r#"run greet "John"#).is_err());
    }

    #[test]
    fn test_numeric_conversion() {
        assert_eq!(
            to_values(&["42", "-3", "+7", "2.5", ".5", "5.", "1e3", "abc", "NaN", "inf", "infinity"]),
            vec![
                json!(42),
                json!(-3),
                json!(7),
                json!(2.5),
                json!(0.5),
                json!(5.0),
                json!(1000.0),
                json!("abc"),
                json!("NaN"),
                json!("inf"),
                json!("infinity")
            ]
        );
    }

    #[test]
    fn test_hex_conversion() {
        assert_eq!(to_values(&["0x10", "0XfF", "-0x10", "0x"]), vec![json!(16), json!(255), json!("-0x10"), json!("0x")]);
    }

    #[test]
    fn test_non_numeric_forms_stay_strings() {
        // Uppercase exponents and trailing text are not numbers.
        assert_eq!(to_values(&["1E3", "12px", "1.2.3", "1e400"]), vec![json!("1E3"), json!("12px"), json!("1.2.3"), json!("1e400")]);
    }
}
