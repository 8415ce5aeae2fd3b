use serde::Deserialize;

/// Login form fields.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Registration form fields.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Optional `?next=` carried through the login flow.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}
