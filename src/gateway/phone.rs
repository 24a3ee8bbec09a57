use crate::error::ServiceError;

const COUNTRY_PREFIX: &str = "254";

/// Normalizes a customer phone number into the gateway's `2547XXXXXXXX` form.
///
/// Strips `+` and whitespace, then replaces a leading local trunk `0` with the
/// country prefix.
pub fn normalize_phone(raw: &str) -> Result<String, ServiceError> {
    let compact: String = raw.chars().filter(|c| *c != '+' && !c.is_whitespace()).collect();
    let phone = match compact.strip_prefix('0') {
        Some(local) => format!("{COUNTRY_PREFIX}{local}"),
        None => compact,
    };
    if phone.len() < 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::Validation(format!("invalid phone number: {raw}")));
    }
    Ok(phone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_numbers_get_country_prefix() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0712 345 678").unwrap(), "254712345678");
    }

    #[test]
    fn international_numbers_are_compacted() {
        assert_eq!(normalize_phone("+254 712 345 678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("254712345678").unwrap(), "254712345678");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("07-call-me").is_err());
        assert!(normalize_phone("0712").is_err());
    }
}
