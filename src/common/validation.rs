// Common validation types and traits

#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Records `"<Label> is required"` when `value` is empty or whitespace.
    pub fn require(&mut self, field: &str, label: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add_error(field, &format!("{} is required", label));
            false
        } else {
            true
        }
    }

    /// Converts into `Err` when any error was recorded.
    pub fn into_result(self) -> Result<(), ValidationResult> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Validator<T> {
    fn validate(&self, data: &T) -> ValidationResult;
}

/// Shape check only: one `@` with a non-empty local part and a dotted domain.
pub fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}
