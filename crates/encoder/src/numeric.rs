//! Decimal text for number literals.
//!
//! The text is later encoded character by character, so the shortest text
//! is not always the cheapest: a digit `0` costs far less than `e` or `-`.
//! The weights below approximate the encoded cost of appending each
//! character to a string.

/// Text that evaluates to `Infinity` when coerced to a number
pub const INFINITY_TEXT: &str = "1e1000";

const APPEND_LENGTH_OF_DIGIT_0: usize = 6;
const APPEND_LENGTH_OF_DIGITS: [usize; 10] = [6, 8, 12, 17, 22, 27, 32, 37, 42, 47];
const APPEND_LENGTH_OF_SMALL_E: usize = 26;
const APPEND_LENGTH_OF_DOT: usize = 73;
const APPEND_LENGTH_OF_MINUS: usize = 154;

/// Digit sequence with a decimal exponent: `value = digits × 10^exp`
struct Scientific {
    digits: String,
    exp: i32,
}

impl Scientific {
    /// Decompose a positive finite number into its shortest significant digits
    fn of(number: f64) -> Self {
        // `{:e}` yields the shortest digits that round-trip, e.g. "1.2345e3"
        let formatted = format!("{number:e}");
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let all_digits = format!("{int_part}{frac_part}");
        let all_digits = all_digits.trim_start_matches('0');
        let digits = all_digits.trim_end_matches('0');
        let trailing_zeros = all_digits.len() - digits.len();
        let exp = exp - frac_part.len() as i32 + trailing_zeros as i32;
        Self {
            digits: lower_last_digit(digits, exp),
            exp,
        }
    }
}

/// Lower the last digit as long as the value does not change
fn lower_last_digit(digits: &str, exp: i32) -> String {
    let Some(last) = digits.chars().last().and_then(|ch| ch.to_digit(10)) else {
        return digits.to_string();
    };
    let prefix = &digits[..digits.len() - 1];
    let value_of = |digit: u32| format!("{prefix}{digit}e{exp}").parse::<f64>().ok();
    let value = value_of(last);
    let mut last = last;
    while last > 0 && value_of(last - 1) == value {
        last -= 1;
    }
    format!("{prefix}{last}")
}

fn zeros(count: usize) -> String {
    "0".repeat(count)
}

fn multi_digit_length(text: &str) -> usize {
    text.chars()
        .filter_map(|ch| ch.to_digit(10))
        .map(|digit| APPEND_LENGTH_OF_DIGITS[digit as usize])
        .sum()
}

/// Exponential form for a small number, when cheaper than `rival_length`
fn replace_negative_exponential(mantissa: &str, exp: i32, rival_length: usize) -> Option<String> {
    let extra_zero_count: i32 = if exp % 100 > -93 {
        if exp % 10 > -7 {
            0
        } else {
            10 + exp % 10
        }
    } else {
        100 + exp % 100
    };
    let extra_zero_count = extra_zero_count as usize;
    let mantissa = format!("{mantissa}{}", zeros(extra_zero_count));
    let exp = exp - extra_zero_count as i32;
    let extra_length = APPEND_LENGTH_OF_DIGIT_0 * extra_zero_count
        + APPEND_LENGTH_OF_SMALL_E
        + APPEND_LENGTH_OF_MINUS
        + multi_digit_length(&(-exp).to_string());
    (extra_length < rival_length).then(|| format!("{mantissa}e{exp}"))
}

/// Cheapest decimal text for a positive finite number
pub fn format_positive_number(number: f64) -> String {
    let Scientific {
        digits: mantissa,
        exp,
    } = Scientific::of(number);
    if exp >= 0 {
        if exp < 10 {
            format!("{mantissa}{}", zeros(exp as usize))
        } else {
            format!("{mantissa}e{exp}")
        }
    } else {
        let length = mantissa.len() as i32;
        if exp >= -length {
            let split = (length + exp) as usize;
            format!("{}.{}", &mantissa[..split], &mantissa[split..])
        } else {
            let extra_zero_count = (-length - exp) as usize;
            let extra_length = APPEND_LENGTH_OF_DOT + APPEND_LENGTH_OF_DIGIT_0 * extra_zero_count;
            replace_negative_exponential(&mantissa, exp, extra_length)
                .unwrap_or_else(|| format!(".{}{mantissa}", zeros(extra_zero_count)))
        }
    }
}

/// Decimal text for a non-negative number literal
pub fn format_number(number: f64) -> String {
    if number == 0.0 {
        "0".to_string()
    } else if number.is_infinite() {
        INFINITY_TEXT.to_string()
    } else {
        format_positive_number(number)
    }
}
