use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::users::repo::User;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response returned after a successful login. The user record is the full
/// stored document, password hash included.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct ImageUpdateResponse {
    pub message: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub user: User,
}

/// Text fields collected from the multipart registration body. Empty
/// strings count as missing, like an empty form input would.
#[derive(Debug, Default)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub age: Option<String>,
    pub jobrole: Option<String>,
    pub location: Option<String>,
    pub education: Option<String>,
}

/// A validated registration: all required fields present, age numeric.
/// `password` is still the plaintext here; the handler hashes it.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub age: i64,
    pub jobrole: String,
    pub location: String,
    pub education: String,
}

impl RegisterForm {
    pub fn set(&mut self, name: &str, value: String) {
        let value = Some(value).filter(|v| !v.is_empty());
        match name {
            "username" => self.username = value,
            "password" => self.password = value,
            "age" => self.age = value,
            "jobrole" => self.jobrole = value,
            "location" => self.location = value,
            "education" => self.education = value,
            // Unknown form fields are ignored, not rejected.
            _ => {}
        }
    }

    pub fn validate(self) -> Result<NewUser, ApiError> {
        let (
            Some(username),
            Some(password),
            Some(age),
            Some(jobrole),
            Some(location),
            Some(education),
        ) = (
            self.username,
            self.password,
            self.age,
            self.jobrole,
            self.location,
            self.education,
        )
        else {
            return Err(ApiError::Validation("Missing required fields".into()));
        };

        let age = age.trim().parse::<i64>().map_err(|_| {
            ApiError::Validation(format!("Error creating user: invalid age {age:?}"))
        })?;

        Ok(NewUser {
            username,
            password,
            age,
            jobrole,
            location,
            education,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> RegisterForm {
        let mut form = RegisterForm::default();
        for (k, v) in [
            ("username", "alice"),
            ("password", "pw123"),
            ("age", "30"),
            ("jobrole", "eng"),
            ("location", "NYC"),
            ("education", "BS"),
        ] {
            form.set(k, v.to_string());
        }
        form
    }

    #[test]
    fn complete_form_validates() {
        let user = full_form().validate().expect("valid form");
        assert_eq!(user.username, "alice");
        assert_eq!(user.age, 30);
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut form = full_form();
        form.education = None;
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let mut form = full_form();
        form.set("location", String::new());
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");
    }

    #[test]
    fn non_numeric_age_is_rejected() {
        let mut form = full_form();
        form.set("age", "thirty".into());
        let err = form.validate().unwrap_err();
        assert!(err.to_string().starts_with("Error creating user:"));
    }

    #[test]
    fn unknown_form_field_is_ignored() {
        let mut form = full_form();
        form.set("role", "admin".into());
        assert!(form.validate().is_ok());
    }
}
