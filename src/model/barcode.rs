//! Item code generation.
//!
//! Ingredient codes are UPC-A shaped (`978` + 8 digits + check digit), product
//! codes are `PRD` followed by the tail of the millisecond clock and two random
//! digits. The search classifier relies on these shapes.

use rand::Rng;

pub const INGREDIENT_PREFIX: &str = "978";
pub const PRODUCT_PREFIX: &str = "PRD";

/// Check digit over the first 11 digits of `digits`: odd positions weigh 1,
/// even positions weigh 3 (the reverse of textbook UPC-A).
///
/// Returns `None` if fewer than 11 ASCII digits are supplied.
pub fn upc_check_digit(digits: &str) -> Option<u8> {
    let bytes = digits.as_bytes();
    if bytes.len() < 11 || !bytes[..11].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut odd = 0u32;
    let mut even = 0u32;
    for (i, b) in bytes[..11].iter().enumerate() {
        let d = u32::from(b - b'0');
        if i % 2 == 0 {
            odd += d;
        } else {
            even += d;
        }
    }
    Some(((10 - ((odd + even * 3) % 10)) % 10) as u8)
}

pub fn ingredient_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(12);
    code.push_str(INGREDIENT_PREFIX);
    for _ in 0..8 {
        code.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    let check = upc_check_digit(&code).unwrap_or(0);
    code.push(char::from(b'0' + check));
    code
}

pub fn product_code<R: Rng + ?Sized>(rng: &mut R, now_ms: i64) -> String {
    let clock = now_ms.unsigned_abs().to_string();
    let tail = &clock[clock.len().saturating_sub(10)..];
    format!("{PRODUCT_PREFIX}{tail}{:02}", rng.gen_range(0..100u8))
}

pub fn batch_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("BATCH{}", rng.gen_range(1000..10000u16))
}
