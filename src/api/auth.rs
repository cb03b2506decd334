//! Account pages
//!
//! Sign-up, login and logout. A successful sign-up logs the new user in.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::common::{clear_session_cookie, safe_next, session_cookie, session_token, NextQuery};
use crate::api::middleware::AppState;
use crate::api::responses::{render_page, PageError};
use crate::models::Session;
use crate::services::{FormErrors, LoginForm, SignupForm, UserServiceError};
use crate::theme::StandardTemplateVars;

/// Login form plus the page to return to
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(flatten)]
    pub form: LoginForm,
    #[serde(default)]
    pub next: Option<String>,
}

/// GET /auth/signup/
pub async fn signup_form(
    State(state): State<AppState>,
    vars: StandardTemplateVars,
) -> Result<Html<String>, PageError> {
    render_signup(&state, &vars, &SignupForm::default(), &FormErrors::new())
}

/// POST /auth/signup/ - Register and log in
pub async fn signup(
    State(state): State<AppState>,
    vars: StandardTemplateVars,
    Form(form): Form<SignupForm>,
) -> Result<Response, PageError> {
    let user = match state.user_service.register(&form).await {
        Ok(user) => user,
        Err(UserServiceError::Validation(errors)) => {
            return Ok(render_signup(&state, &vars, &form, &errors)?.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let session = state.user_service.create_session(user.id).await?;
    Ok(logged_in_redirect(&state, &session, "/"))
}

/// GET /auth/login/
pub async fn login_form(
    State(state): State<AppState>,
    vars: StandardTemplateVars,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, PageError> {
    render_login(&state, &vars, &LoginForm::default(), &FormErrors::new(), query.next.as_deref())
}

/// POST /auth/login/ - Check credentials, set the session cookie
pub async fn login(
    State(state): State<AppState>,
    vars: StandardTemplateVars,
    Form(request): Form<LoginRequest>,
) -> Result<Response, PageError> {
    match state.user_service.login(&request.form).await {
        Ok((_, session)) => Ok(logged_in_redirect(
            &state,
            &session,
            &safe_next(request.next.as_deref()),
        )),
        Err(UserServiceError::Validation(errors)) => Ok(render_login(
            &state,
            &vars,
            &request.form,
            &errors,
            request.next.as_deref(),
        )?
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// GET /auth/logout/ - End the session and clear the cookie
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, PageError> {
    if let Some(token) = session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    Ok(([(header::SET_COOKIE, clear_session_cookie())], Redirect::to("/")).into_response())
}

fn logged_in_redirect(state: &AppState, session: &Session, to: &str) -> Response {
    let cookie = session_cookie(&session.id, state.auth_config.session_days);
    ([(header::SET_COOKIE, cookie)], Redirect::to(to)).into_response()
}

fn render_signup(
    state: &AppState,
    vars: &StandardTemplateVars,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<Html<String>, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    render_page(state, "users/signup.html", &context, vars)
}

fn render_login(
    state: &AppState,
    vars: &StandardTemplateVars,
    form: &LoginForm,
    errors: &FormErrors,
    next: Option<&str>,
) -> Result<Html<String>, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("next", &safe_next(next));
    render_page(state, "users/login.html", &context, vars)
}
