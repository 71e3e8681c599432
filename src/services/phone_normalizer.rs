//! services/phone_normalizer.rs
//! Convierte números escritos a mano en la forma canónica `+<código><número>`.

/// Largo de un número nacional sin código de país.
const NATIONAL_NUMBER_LEN: usize = 10;

/// Normaliza `raw`.
///
/// - Si ya empieza con `+` se devuelve limpio, sin tocar.
/// - Si viene `country_code` explícito se antepone (con `+`).
/// - Si no, 10 dígitos o menos llevan `default_country_code`; más de 10 solo un `+`.
///
/// Entrada vacía (o sin dígitos) devuelve `""`.
pub fn normalize_number(raw: &str, country_code: Option<&str>, default_country_code: &str) -> String {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return String::new();
    }
    if cleaned.starts_with('+') {
        return cleaned;
    }

    if let Some(code) = country_code.map(as_prefix).filter(|c| !c.is_empty()) {
        return format!("{}{}", code, cleaned);
    }

    if cleaned.len() > NATIONAL_NUMBER_LEN {
        format!("+{}", cleaned)
    } else {
        format!("{}{}", as_prefix(default_country_code), cleaned)
    }
}

/// Deja solo dígitos y un `+` inicial.
fn clean(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

fn as_prefix(code: &str) -> String {
    let cleaned = clean(code);
    if cleaned.is_empty() || cleaned.starts_with('+') {
        cleaned
    } else {
        format!("+{}", cleaned)
    }
}
