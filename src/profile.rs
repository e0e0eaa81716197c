use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use log::{error, info};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth;
use crate::config::Config;
use crate::db::MongoDB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    /// Exact match against the configured teacher address; everything else
    /// is a student.
    pub fn for_email(email: &str, teacher_email: &str) -> Role {
        if email == teacher_email {
            Role::Teacher
        } else {
            Role::Student
        }
    }

    /// Where the client sends this role after sign-in.
    pub fn redirect(self) -> &'static str {
        match self {
            Role::Teacher => "/dashboard",
            Role::Student => "/home",
        }
    }
}

/// Application-level user entity, distinct from the credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fetch the profile for `user_id`, creating it when missing. One existence
/// check only; a racing second insert loses on the _id constraint.
pub async fn resolve_profile(
    db: &MongoDB,
    config: &Config,
    user_id: &str,
    email: &str,
    display_name: Option<&str>,
) -> mongodb::error::Result<Profile> {
    let profiles = db.collection::<Profile>("profiles");

    if let Some(existing) = profiles.find_one(doc! { "_id": user_id }).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let fallback_name = email.split('@').next().unwrap_or(email);
    let profile = Profile {
        user_id: user_id.to_string(),
        display_name: display_name.unwrap_or(fallback_name).to_string(),
        email: email.to_string(),
        role: Role::for_email(email, &config.teacher_email),
        created_at: now,
        updated_at: now,
    };
    profiles.insert_one(&profile).await?;
    info!("Profile created for {} as {:?}", email, profile.role);
    Ok(profile)
}

/// Dashboard mutations are gated on this.
pub async fn is_teacher(db: &MongoDB, user_id: &str) -> mongodb::error::Result<bool> {
    let profiles = db.collection::<Profile>("profiles");
    Ok(profiles
        .find_one(doc! { "_id": user_id, "role": "teacher" })
        .await?
        .is_some())
}

/// Map a role check onto the gate response. Denial stays 401; a store
/// error logs and maps to 500, never to a silent denial.
pub fn teacher_gate(check: mongodb::error::Result<bool>) -> Result<(), HttpResponse> {
    match check {
        Ok(true) => Ok(()),
        Ok(false) => Err(HttpResponse::Unauthorized().body("Teacher role required")),
        Err(e) => {
            error!("Error checking role: {}", e);
            Err(HttpResponse::InternalServerError().body("Error checking role"))
        }
    }
}

/// GET /profiles/{user_id} — own profile only.
pub async fn get_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> impl Responder {
    let current_user = match auth::current_user(&req) {
        Some(id) => id,
        None => return auth::session_expired(),
    };
    if current_user != *user_id {
        return HttpResponse::Unauthorized().body("Cannot access another user's profile");
    }

    let profiles = data.mongodb.collection::<Profile>("profiles");
    match profiles.find_one(doc! { "_id": &*user_id }).await {
        Ok(Some(profile)) => HttpResponse::Ok().json(profile),
        Ok(None) => HttpResponse::NotFound().body("Profile not found"),
        Err(e) => HttpResponse::InternalServerError().body(format!("Error fetching profile: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teacher_address_gets_teacher_role_and_dashboard() {
        let role = Role::for_email("teacher@eduportal.app", "teacher@eduportal.app");
        assert_eq!(role, Role::Teacher);
        assert_eq!(role.redirect(), "/dashboard");
    }

    #[test]
    fn every_other_address_is_a_student() {
        let role = Role::for_email("kid@school.example", "teacher@eduportal.app");
        assert_eq!(role, Role::Student);
        assert_eq!(role.redirect(), "/home");
    }

    #[test]
    fn match_is_exact_not_case_folded() {
        let role = Role::for_email("Teacher@eduportal.app", "teacher@eduportal.app");
        assert_eq!(role, Role::Student);
    }

    #[test]
    fn teacher_gate_keeps_denial_and_store_error_distinct() {
        assert!(teacher_gate(Ok(true)).is_ok());

        let denied = teacher_gate(Ok(false)).unwrap_err();
        assert_eq!(denied.status(), 401);

        let failed = teacher_gate(Err(mongodb::error::Error::custom("store down"))).unwrap_err();
        assert_eq!(failed.status(), 500);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Teacher).unwrap(), "teacher");
        assert_eq!(serde_json::to_value(Role::Student).unwrap(), "student");
    }
}
