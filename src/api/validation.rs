//! Input validation for API requests.
//!
//! Pure shape/range checks only. Uniqueness and referential integrity are
//! enforced by database constraints at write time, not here.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

/// Field length cap shared by email, full name, item name and description
pub const MAX_FIELD_LEN: usize = 255;

/// Password length bounds, inclusive
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 40;

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > MAX_FIELD_LEN {
        return Err(format!("Email is too long (max {} characters)", MAX_FIELD_LEN));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a plaintext password before it is hashed
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(format!(
            "Password is too short (min {} characters)",
            PASSWORD_MIN_LEN
        ));
    }

    if password.len() > PASSWORD_MAX_LEN {
        return Err(format!(
            "Password is too long (max {} characters)",
            PASSWORD_MAX_LEN
        ));
    }

    Ok(())
}

/// Validate a user's full name (optional field)
pub fn validate_full_name(full_name: &Option<String>) -> Result<(), String> {
    if let Some(n) = full_name {
        if n.len() > MAX_FIELD_LEN {
            return Err(format!(
                "Full name is too long (max {} characters)",
                MAX_FIELD_LEN
            ));
        }
    }

    Ok(())
}

/// Validate an inventory item name
pub fn validate_item_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > MAX_FIELD_LEN {
        return Err(format!("Name is too long (max {} characters)", MAX_FIELD_LEN));
    }

    Ok(())
}

/// Validate an inventory item description (optional field)
pub fn validate_item_description(description: &Option<String>) -> Result<(), String> {
    if let Some(d) = description {
        if d.len() > MAX_FIELD_LEN {
            return Err(format!(
                "Description is too long (max {} characters)",
                MAX_FIELD_LEN
            ));
        }
    }

    Ok(())
}

/// Validate an inventory item price
pub fn validate_price(price: f64) -> Result<(), String> {
    if !price.is_finite() {
        return Err("Price must be a finite number".to_string());
    }

    if price <= 0.0 {
        return Err("Price must be greater than 0".to_string());
    }

    Ok(())
}

/// Validate an inventory item stock level
pub fn validate_stock(stock: i64) -> Result<(), String> {
    if stock < 0 {
        return Err("Stock cannot be negative".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}
