use actix_web::{post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    auth::AuthService,
    error::AppError,
    models::{welcome_tasks, LogonRequest, NewUser, RegisterRequest, User, USER_FIELDS},
    query::FieldSelection,
    store::Store,
};

#[derive(Debug, Deserialize)]
pub struct FieldsQuery {
    pub fields: Option<String>,
}

/// Register a new user
///
/// Creates the account together with a few starter tasks and opens a session:
/// the JWT is set as the `jwt` cookie and echoed in the body next to the CSRF
/// token the client must send back in `X-CSRF-TOKEN`.
#[post("/register")]
pub async fn register(
    store: web::Data<dyn Store>,
    auth: web::Data<AuthService>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let request = register_data.into_inner().normalize();
    request.validate()?;

    let password_hash = auth.hash_password(request.password).await?;
    let new_user = NewUser {
        name: request.name,
        email: request.email,
        password_hash,
    };
    let (user, tasks_created) = store.register_user(new_user, welcome_tasks()).await?;
    log::info!("registered user {} with {} starter tasks", user.id, tasks_created);

    let session = auth.issue_session(&user)?;
    Ok(HttpResponse::Created()
        .cookie(auth.session_cookie(&session))
        .json(json!({
            "user": user,
            "tasks_created": tasks_created,
            "csrf_token": session.csrf_token,
            "token": session.token,
        })))
}

/// Log on
///
/// Checks the credentials and opens a new session. Unknown emails and wrong
/// passwords get the same 401.
#[post("/logon")]
pub async fn logon(
    store: web::Data<dyn Store>,
    auth: web::Data<AuthService>,
    logon_data: web::Json<LogonRequest>,
) -> Result<impl Responder, AppError> {
    let request = logon_data.into_inner().normalize();
    request.validate()?;

    let credentials = match store.find_credentials(&request.email).await? {
        Some(credentials) => credentials,
        None => {
            log::warn!("logon attempt for unknown email");
            auth.verify_unknown(request.password).await?;
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    let valid = auth
        .verify_password(request.password, credentials.password_hash.clone())
        .await?;
    if !valid {
        log::warn!("failed logon for user {}", credentials.id);
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let user: User = credentials.into();
    let session = auth.issue_session(&user)?;
    Ok(HttpResponse::Ok()
        .cookie(auth.session_cookie(&session))
        .json(json!({
            "id": user.id,
            "name": user.name,
            "csrf_token": session.csrf_token,
            "token": session.token,
        })))
}

/// Log off
///
/// Expires the session cookie. Works without a valid session so a client can
/// always clear a stale cookie.
#[post("/logoff")]
pub async fn logoff(auth: web::Data<AuthService>) -> impl Responder {
    HttpResponse::Ok()
        .cookie(auth.removal_cookie())
        .json(json!({ "message": "Successfully logged off" }))
}

/// Fetch a user profile, optionally reduced to `fields=id,name,...`.
pub async fn get_user(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    query: web::Query<FieldsQuery>,
) -> Result<HttpResponse, AppError> {
    let id = super::parse_id(&path, "User")?;
    let user = store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let fields = FieldSelection::parse(query.fields.as_deref(), USER_FIELDS);
    Ok(HttpResponse::Ok().json(fields.project(&user)?))
}
