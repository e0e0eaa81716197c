use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use mongodb::bson::doc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::profile::{self, Profile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

/// Credential record, distinct from the profile the pages render.
#[derive(Serialize, Deserialize, Debug)]
pub struct Account {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct SignupInfo {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

/// Federated sign-in payload. Token verification happens at the provider;
/// by the time the popup posts here the identity is already established.
#[derive(Deserialize)]
pub struct GoogleSignIn {
    pub email: String,
    pub display_name: Option<String>,
}

// JWT Creation
pub fn create_jwt(user_id: &str, email: &str, secret: &str) -> String {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .unwrap()
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// The user id the session middleware put on the request, if any.
pub fn current_user(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<String>().cloned()
}

pub fn current_claims(req: &HttpRequest) -> Option<Claims> {
    req.extensions().get::<Claims>().cloned()
}

/// 401 with the login redirect the client schedules. Handlers call this
/// before touching any collection, so an unauthenticated request makes no
/// store calls.
pub fn session_expired() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "error": "Not signed in",
        "redirect": "/login"
    }))
}

fn valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern"))
        .is_match(email)
}

fn session_response(token: String, profile: &Profile) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "user_id": profile.user_id,
        "role": profile.role,
        "redirect": profile.role.redirect(),
    }))
}

async fn provision_account(
    data: &web::Data<AppState>,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<(Account, Profile), HttpResponse> {
    let hashed_password = match hash(password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => {
            return Err(HttpResponse::InternalServerError().body("Error hashing password"))
        }
    };

    let new_account = Account {
        user_id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password: hashed_password,
        created_at: Utc::now(),
    };

    let accounts = data.mongodb.collection::<Account>("accounts");
    if let Err(e) = accounts.insert_one(&new_account).await {
        error!("Error creating account: {}", e);
        return Err(HttpResponse::InternalServerError().body("Error creating account"));
    }

    match profile::resolve_profile(
        &data.mongodb,
        &data.config,
        &new_account.user_id,
        email,
        display_name,
    )
    .await
    {
        Ok(p) => Ok((new_account, p)),
        Err(e) => {
            error!("Error creating profile: {}", e);
            Err(HttpResponse::InternalServerError().body("Error creating profile"))
        }
    }
}

// Signup Endpoint
pub async fn signup(data: web::Data<AppState>, signup_info: web::Json<SignupInfo>) -> impl Responder {
    if !valid_email(&signup_info.email) {
        return HttpResponse::BadRequest().body("Invalid email address");
    }

    let accounts = data.mongodb.collection::<Account>("accounts");
    match accounts.find_one(doc! { "email": &signup_info.email }).await {
        Ok(Some(_)) => return HttpResponse::Conflict().body("Account already exists"),
        Ok(None) => {}
        Err(e) => {
            error!("Error checking account: {}", e);
            return HttpResponse::InternalServerError().body("Error creating account");
        }
    }

    match provision_account(
        &data,
        &signup_info.email,
        &signup_info.password,
        Some(&signup_info.display_name),
    )
    .await
    {
        Ok((account, p)) => {
            info!("Account created for {}", account.email);
            session_response(
                create_jwt(&account.user_id, &account.email, &data.config.jwt_secret),
                &p,
            )
        }
        Err(resp) => resp,
    }
}

// Login Endpoint. An unknown address falls through to account creation, the
// same branch the original took on its "no such account" error code.
pub async fn login(data: web::Data<AppState>, login_info: web::Json<LoginInfo>) -> impl Responder {
    let accounts = data.mongodb.collection::<Account>("accounts");
    let account_doc = accounts.find_one(doc! { "email": &login_info.email }).await;

    match account_doc {
        Ok(Some(account)) => {
            if !verify(&login_info.password, &account.password).unwrap_or(false) {
                return HttpResponse::Unauthorized().body("Invalid credentials");
            }
            match profile::resolve_profile(
                &data.mongodb,
                &data.config,
                &account.user_id,
                &account.email,
                None,
            )
            .await
            {
                Ok(p) => session_response(
                    create_jwt(&account.user_id, &account.email, &data.config.jwt_secret),
                    &p,
                ),
                Err(e) => {
                    error!("Error resolving profile: {}", e);
                    HttpResponse::InternalServerError().body("Error logging in")
                }
            }
        }
        Ok(None) => {
            if !valid_email(&login_info.email) {
                return HttpResponse::BadRequest().body("Invalid email address");
            }
            info!("No account for {}, creating one", login_info.email);
            match provision_account(&data, &login_info.email, &login_info.password, None).await {
                Ok((account, p)) => session_response(
                    create_jwt(&account.user_id, &account.email, &data.config.jwt_secret),
                    &p,
                ),
                Err(resp) => resp,
            }
        }
        Err(e) => HttpResponse::InternalServerError().body(format!("Error logging in: {}", e)),
    }
}

// Google sign-in: upsert on email, never a password check.
pub async fn google_signin(
    data: web::Data<AppState>,
    payload: web::Json<GoogleSignIn>,
) -> impl Responder {
    if !valid_email(&payload.email) {
        return HttpResponse::BadRequest().body("Invalid email address");
    }

    let accounts = data.mongodb.collection::<Account>("accounts");
    match accounts.find_one(doc! { "email": &payload.email }).await {
        Ok(Some(account)) => {
            match profile::resolve_profile(
                &data.mongodb,
                &data.config,
                &account.user_id,
                &account.email,
                payload.display_name.as_deref(),
            )
            .await
            {
                Ok(p) => session_response(
                    create_jwt(&account.user_id, &account.email, &data.config.jwt_secret),
                    &p,
                ),
                Err(e) => {
                    error!("Error resolving profile: {}", e);
                    HttpResponse::InternalServerError().body("Error signing in")
                }
            }
        }
        Ok(None) => {
            // No usable password for a federated account; store a throwaway.
            let placeholder = Uuid::new_v4().to_string();
            match provision_account(
                &data,
                &payload.email,
                &placeholder,
                payload.display_name.as_deref(),
            )
            .await
            {
                Ok((account, p)) => session_response(
                    create_jwt(&account.user_id, &account.email, &data.config.jwt_secret),
                    &p,
                ),
                Err(resp) => resp,
            }
        }
        Err(e) => HttpResponse::InternalServerError().body(format!("Error signing in: {}", e)),
    }
}

/// GET /auth/session — the state-change notification analogue: returns the
/// resolved profile for the presented token, creating the profile record if
/// an earlier write raced or failed silently.
pub async fn session(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let claims = match current_claims(&req) {
        Some(c) => c,
        None => return session_expired(),
    };

    match profile::resolve_profile(&data.mongodb, &data.config, &claims.sub, &claims.email, None)
        .await
    {
        Ok(p) => HttpResponse::Ok().json(serde_json::json!({
            "user_id": p.user_id,
            "display_name": p.display_name,
            "email": p.email,
            "role": p.role,
            "redirect": p.role.redirect(),
        })),
        Err(e) => {
            error!("Error resolving session: {}", e);
            HttpResponse::InternalServerError().body("Error resolving session")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trips_sub_and_email() {
        let token = create_jwt("user-1", "kid@school.example", "test-secret");
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "kid@school.example");
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let token = create_jwt("user-1", "kid@school.example", "test-secret");
        assert!(validate_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn email_shape_check() {
        assert!(valid_email("a@b.co"));
        assert!(valid_email("first.last@school.example"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a b@c.d"));
        assert!(!valid_email("a@b"));
    }

    #[test]
    fn unauthenticated_response_carries_login_redirect() {
        let resp = session_expired();
        assert_eq!(resp.status(), 401);
    }
}
