use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ClientError, ClientResult, FieldErrors};
use crate::forms::{LoginForm, Registration};
use crate::models::UserProfile;
use crate::routes::Route;
use crate::session::SessionController;

use super::{nav_bar, MountGuard, View};

fn render_errors(out: &mut String, errors: &FieldErrors) {
    for (field, messages) in errors.iter() {
        for message in messages {
            if field == FieldErrors::NON_FIELD {
                let _ = writeln!(out, "! {message}");
            } else {
                let _ = writeln!(out, "! {field}: {message}");
            }
        }
    }
}

pub struct LoginView {
    session: Arc<SessionController>,
    mount: MountGuard,
    pub form: LoginForm,
    errors: FieldErrors,
    error: Option<String>,
}

impl LoginView {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self {
            session,
            mount: MountGuard::new(),
            form: LoginForm::default(),
            errors: FieldErrors::new(),
            error: None,
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Exchange the credentials for tokens and hydrate the session.
    pub async fn submit(&mut self) -> ClientResult<Route> {
        self.errors = self.form.validate();
        if !self.errors.is_empty() {
            return Err(ClientError::Validation(self.errors.clone()));
        }
        self.error = None;

        match self
            .session
            .login_with_credentials(self.form.username.trim(), &self.form.password)
            .await
        {
            Ok(_) => Ok(Route::Home),
            Err(err) => {
                let message = match &err {
                    ClientError::Unauthorized => "Invalid username or password".to_string(),
                    ClientError::Validation(errors) => errors.to_string(),
                    _ => "Login failed. Please try again.".to_string(),
                };
                self.mount.apply(|| self.error = Some(message));
                Err(err)
            }
        }
    }
}

#[async_trait]
impl View for LoginView {
    fn route(&self) -> Route {
        Route::Login
    }

    async fn load(&mut self) -> ClientResult<()> {
        Ok(())
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", nav_bar(&self.session.access()));
        let _ = writeln!(out);
        let _ = writeln!(out, "Login");
        if let Some(error) = &self.error {
            let _ = writeln!(out, "{error}");
        }
        render_errors(&mut out, &self.errors);
        let _ = writeln!(out, "Username: {}", self.form.username);
        let _ = writeln!(out, "Password: {}", "*".repeat(self.form.password.chars().count()));
        out
    }

    /// Signed-in users have nothing to do here.
    fn redirect(&self) -> Option<Route> {
        self.session.user().map(|_| Route::Home)
    }

    fn mount(&self) -> &MountGuard {
        &self.mount
    }
}

pub struct RegisterView {
    session: Arc<SessionController>,
    mount: MountGuard,
    pub form: Registration,
    errors: FieldErrors,
    error: Option<String>,
}

impl RegisterView {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self {
            session,
            mount: MountGuard::new(),
            form: Registration::default(),
            errors: FieldErrors::new(),
            error: None,
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Register, then log in with the same credentials.
    ///
    /// Server-side field errors replace the local ones so they show inline.
    pub async fn submit(&mut self) -> ClientResult<UserProfile> {
        self.errors = self.form.validate();
        if !self.errors.is_empty() {
            return Err(ClientError::Validation(self.errors.clone()));
        }
        self.error = None;

        match self.session.register(&self.form).await {
            Ok(profile) => Ok(profile),
            Err(ClientError::Validation(errors)) => {
                tracing::info!(fields = %errors, "registration rejected");
                self.mount.apply(|| self.errors = errors.clone());
                Err(ClientError::Validation(errors))
            }
            Err(err) => {
                tracing::error!(error = %err, "registration failed");
                self.mount
                    .apply(|| self.error = Some("Registration failed. Please try again.".to_string()));
                Err(err)
            }
        }
    }
}

#[async_trait]
impl View for RegisterView {
    fn route(&self) -> Route {
        Route::Register
    }

    async fn load(&mut self) -> ClientResult<()> {
        Ok(())
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", nav_bar(&self.session.access()));
        let _ = writeln!(out);
        let _ = writeln!(out, "Register");
        if let Some(error) = &self.error {
            let _ = writeln!(out, "{error}");
        }
        render_errors(&mut out, &self.errors);
        for (field, value) in self.form.text_fields() {
            if field.starts_with("password") {
                continue;
            }
            let _ = writeln!(out, "{field}: {value}");
        }
        if let Some(path) = &self.form.profile_pic {
            let _ = writeln!(out, "profile_pic: {}", path.display());
        }
        out
    }

    fn redirect(&self) -> Option<Route> {
        self.session.user().map(|_| Route::Home)
    }

    fn mount(&self) -> &MountGuard {
        &self.mount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_errors_places_non_field_messages_first_class() {
        let mut errors = FieldErrors::new();
        errors.add(FieldErrors::NON_FIELD, "Unable to register");
        errors.add("username", "Taken");
        let mut out = String::new();
        render_errors(&mut out, &errors);
        assert!(out.contains("! Unable to register\n"));
        assert!(out.contains("! username: Taken\n"));
    }
}
