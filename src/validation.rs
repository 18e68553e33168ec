// src/validation.rs
//
// Pre-submit checks. They keep obviously bad requests off the wire; the
// backend still enforces its own rules.

use crate::error::ValidationError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn task_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::new("title", "Title is required"));
    }
    Ok(())
}

pub fn group_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name", "Group name is required"));
    }
    Ok(())
}

pub fn sign_up(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::new("password_confirm", "Passwords do not match"));
    }
    password_length(password)
}

pub fn password_change(new_password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if new_password != confirmation {
        return Err(ValidationError::new(
            "confirm_password",
            "New passwords do not match",
        ));
    }
    password_length(new_password)
}

pub fn invite_code(code: &str) -> Result<(), ValidationError> {
    if code.trim().is_empty() {
        return Err(ValidationError::new("code", "Please enter a group code or link"));
    }
    Ok(())
}

fn password_length(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}
