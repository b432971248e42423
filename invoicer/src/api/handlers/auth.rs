//! Signup, login and logout.
//!
//! Successful signup and login set the session cookie and redirect; invalid submissions re-render
//! the form with its errors and the submitted values (passwords are never echoed back).

use axum::{
    Form,
    extract::{Query, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::{
        forms::FormErrors,
        users::{CurrentUser, LoginForm, LoginQuery, SignupForm, safe_next},
    },
    auth::{
        password::{self, Argon2Params},
        session,
    },
    db::{
        errors::{DbError, constraints},
        handlers::Users,
        models::users::UserCreateDBRequest,
    },
    errors::Error,
    flash::{Flash, FlashMessage, IncomingFlash},
};

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "An account with this email address already exists.";
const INVALID_LOGIN: &str = "Invalid username or password.";

#[derive(Serialize)]
struct SignupPage<'a> {
    form: &'a SignupForm,
    errors: &'a FormErrors,
    allow_registration: bool,
}

#[derive(Serialize)]
struct LoginPage<'a> {
    form: &'a LoginForm,
    errors: &'a FormErrors,
    allow_registration: bool,
}

fn signup_response(state: &AppState, status: StatusCode, flash: IncomingFlash, form: &SignupForm, errors: &FormErrors) -> Result<Response, Error> {
    state.templates.page(
        status,
        "signup.html",
        None,
        flash,
        SignupPage {
            form,
            errors,
            allow_registration: state.config.auth.allow_registration,
        },
    )
}

fn login_response(state: &AppState, status: StatusCode, flash: IncomingFlash, form: &LoginForm, errors: &FormErrors) -> Result<Response, Error> {
    state.templates.page(
        status,
        "login.html",
        None,
        flash,
        LoginPage {
            form,
            errors,
            allow_registration: state.config.auth.allow_registration,
        },
    )
}

/// Set the session cookie for `user` and redirect to `to`
fn start_session(state: &AppState, user: &CurrentUser, to: &str, flash: Option<FlashMessage>) -> Result<Response, Error> {
    let token = session::create_session_token(user, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);
    let flash = Flash(flash.into_iter().collect());
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), flash, Redirect::to(to)).into_response())
}

#[instrument(skip_all)]
pub async fn signup_page(State(state): State<AppState>, user: Option<CurrentUser>, flash: IncomingFlash) -> Result<Response, Error> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    signup_response(&state, StatusCode::OK, flash, &SignupForm::default(), &FormErrors::new())
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn signup(State(state): State<AppState>, flash: IncomingFlash, Form(mut form): Form<SignupForm>) -> Result<Response, Error> {
    if !state.config.auth.allow_registration {
        return signup_response(&state, StatusCode::FORBIDDEN, flash, &form, &FormErrors::new());
    }

    if let Err(errors) = form.validate(&state.config.auth.password) {
        return signup_response(&state, StatusCode::UNPROCESSABLE_ENTITY, flash, &form, &errors);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let mut errors = FormErrors::new();
    if users.get_user_by_username(&form.username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }
    if users.get_user_by_email(&form.email).await?.is_some() {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        return signup_response(&state, StatusCode::UNPROCESSABLE_ENTITY, flash, &form, &errors);
    }

    let password_hash = password::hash_password(form.password.clone(), Argon2Params::from(&state.config.auth.password)).await?;

    let created = match users
        .create(&UserCreateDBRequest {
            username: form.username.clone(),
            email: form.email.clone(),
            password_hash,
        })
        .await
    {
        Ok(user) => user,
        // Lost a race with a concurrent signup for the same name or address
        Err(e @ DbError::UniqueViolation { .. }) => {
            if e.is_unique_violation_of(constraints::EMAIL_UNIQUE) {
                errors.add("email", EMAIL_TAKEN);
            } else {
                errors.add("username", USERNAME_TAKEN);
            }
            return signup_response(&state, StatusCode::UNPROCESSABLE_ENTITY, flash, &form, &errors);
        }
        Err(e) => return Err(e.into()),
    };
    users.touch_last_login(created.id).await?;

    info!("Registered user {}", created.username);
    let user = CurrentUser::from(created);
    start_session(&state, &user, "/dashboard", Some(FlashMessage::success("Account created successfully!")))
}

#[instrument(skip_all)]
pub async fn login_page(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    flash: IncomingFlash,
    Query(query): Query<LoginQuery>,
) -> Result<Response, Error> {
    let next = safe_next(query.next.as_deref()).map(str::to_string);
    if user.is_some() {
        return Ok(Redirect::to(next.as_deref().unwrap_or("/dashboard")).into_response());
    }

    let form = LoginForm { next, ..Default::default() };
    login_response(&state, StatusCode::OK, flash, &form, &FormErrors::new())
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(State(state): State<AppState>, flash: IncomingFlash, Form(mut form): Form<LoginForm>) -> Result<Response, Error> {
    form.username = form.username.trim().to_string();
    form.next = safe_next(form.next.as_deref()).map(str::to_string);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let user = users.get_user_by_username(&form.username).await?;
    let verified = !form.password.is_empty()
        && password::verify_login_password(
            form.password.clone(),
            user.as_ref().map(|u| u.password_hash.clone()),
            Argon2Params::from(&state.config.auth.password),
        )
        .await?;

    let Some(user) = user.filter(|_| verified) else {
        info!("Failed login attempt");
        let mut errors = FormErrors::new();
        errors.add_non_field(INVALID_LOGIN);
        return login_response(&state, StatusCode::UNPROCESSABLE_ENTITY, flash, &form, &errors);
    };

    users.touch_last_login(user.id).await?;
    info!("User {} logged in", user.username);

    let to = form.next.as_deref().unwrap_or("/dashboard").to_string();
    start_session(&state, &CurrentUser::from(user), &to, None)
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = session::clear_session_cookie(&state.config);
    let flash = Flash::from(FlashMessage::info("You have been logged out."));
    (AppendHeaders([(SET_COOKIE, cookie)]), flash, Redirect::to("/")).into_response()
}
