use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use log::error;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth;
use crate::profile::Profile;

/// Per-user progress record, keyed by email. Both lists grow through
/// `$addToSet`, so re-submitting the same id is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "_id")]
    pub email: String,
    #[serde(default)]
    pub watched_videos: Vec<String>,
    #[serde(default)]
    pub completed_exams: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Progress {
    fn empty(email: &str) -> Self {
        Progress {
            email: email.to_string(),
            watched_videos: Vec::new(),
            completed_exams: Vec::new(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WatchedRequest {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExamRequest {
    pub exam_id: String,
}

async fn owns_email(
    data: &web::Data<AppState>,
    user_id: &str,
    email: &str,
) -> mongodb::error::Result<bool> {
    let profiles = data.mongodb.collection::<Profile>("profiles");
    Ok(profiles
        .find_one(doc! { "_id": user_id, "email": email })
        .await?
        .is_some())
}

/// Denial stays 401; a store error logs and maps to 500 so a transient
/// failure never reads as "not your record".
fn owner_gate(check: mongodb::error::Result<bool>, denied: &str) -> Result<(), HttpResponse> {
    match check {
        Ok(true) => Ok(()),
        Ok(false) => Err(HttpResponse::Unauthorized().body(denied.to_string())),
        Err(e) => {
            error!("Error checking progress owner: {}", e);
            Err(HttpResponse::InternalServerError().body("Error checking progress owner"))
        }
    }
}

/// GET /progress/{email} — a user who has watched nothing yet gets an empty
/// record, not a 404.
pub async fn get_progress(
    req: HttpRequest,
    data: web::Data<AppState>,
    email: web::Path<String>,
) -> impl Responder {
    let current_user = match auth::current_user(&req) {
        Some(id) => id,
        None => return auth::session_expired(),
    };
    if let Err(resp) = owner_gate(
        owns_email(&data, &current_user, &email).await,
        "Cannot access another user's progress",
    ) {
        return resp;
    }

    let coll = data.mongodb.collection::<Progress>("progress");
    match coll.find_one(doc! { "_id": email.as_str() }).await {
        Ok(Some(progress)) => HttpResponse::Ok().json(progress),
        Ok(None) => HttpResponse::Ok().json(Progress::empty(&email)),
        Err(e) => {
            error!("Error fetching progress: {}", e);
            HttpResponse::InternalServerError().body("Error fetching progress")
        }
    }
}

/// POST /progress/{email}/watched
pub async fn mark_watched(
    req: HttpRequest,
    data: web::Data<AppState>,
    email: web::Path<String>,
    payload: web::Json<WatchedRequest>,
) -> impl Responder {
    let current_user = match auth::current_user(&req) {
        Some(id) => id,
        None => return auth::session_expired(),
    };
    if let Err(resp) = owner_gate(
        owns_email(&data, &current_user, &email).await,
        "Cannot update another user's progress",
    ) {
        return resp;
    }

    let coll = data.mongodb.collection::<Progress>("progress");
    let update = doc! {
        "$addToSet": { "watched_videos": &payload.video_id },
        "$set": { "updated_at": Utc::now().to_rfc3339() },
    };
    match coll
        .update_one(doc! { "_id": email.as_str() }, update)
        .upsert(true)
        .await
    {
        Ok(_) => HttpResponse::Ok().body("Progress updated"),
        Err(e) => {
            error!("Error updating progress: {}", e);
            HttpResponse::InternalServerError().body("Error updating progress")
        }
    }
}

/// POST /progress/{email}/exams
pub async fn mark_exam_completed(
    req: HttpRequest,
    data: web::Data<AppState>,
    email: web::Path<String>,
    payload: web::Json<ExamRequest>,
) -> impl Responder {
    let current_user = match auth::current_user(&req) {
        Some(id) => id,
        None => return auth::session_expired(),
    };
    if let Err(resp) = owner_gate(
        owns_email(&data, &current_user, &email).await,
        "Cannot update another user's progress",
    ) {
        return resp;
    }

    let coll = data.mongodb.collection::<Progress>("progress");
    let update = doc! {
        "$addToSet": { "completed_exams": &payload.exam_id },
        "$set": { "updated_at": Utc::now().to_rfc3339() },
    };
    match coll
        .update_one(doc! { "_id": email.as_str() }, update)
        .upsert(true)
        .await
    {
        Ok(_) => HttpResponse::Ok().body("Progress updated"),
        Err(e) => {
            error!("Error updating progress: {}", e);
            HttpResponse::InternalServerError().body("Error updating progress")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_fills_in_empty_lists() {
        let progress: Progress =
            serde_json::from_value(serde_json::json!({ "_id": "kid@school.example" })).unwrap();
        assert_eq!(progress.email, "kid@school.example");
        assert!(progress.watched_videos.is_empty());
        assert!(progress.completed_exams.is_empty());
        assert!(progress.updated_at.is_none());
    }

    #[test]
    fn owner_gate_keeps_denial_and_store_error_distinct() {
        assert!(owner_gate(Ok(true), "denied").is_ok());

        let denied = owner_gate(Ok(false), "denied").unwrap_err();
        assert_eq!(denied.status(), 401);

        let failed =
            owner_gate(Err(mongodb::error::Error::custom("store down")), "denied").unwrap_err();
        assert_eq!(failed.status(), 500);
    }

    #[test]
    fn empty_record_serializes_with_lists() {
        let json = serde_json::to_value(Progress::empty("kid@school.example")).unwrap();
        assert_eq!(json["_id"], "kid@school.example");
        assert_eq!(json["watched_videos"], serde_json::json!([]));
        assert_eq!(json["completed_exams"], serde_json::json!([]));
    }
}
