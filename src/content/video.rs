use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth;
use crate::content::{ContentKind, LoadState};
use crate::filter::{self, Searchable, SortKey};
use crate::profile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// External link or an uploaded file's download URL.
    pub media_url: String,
    /// Display duration, e.g. "12:34".
    pub duration: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Searchable for Video {
    fn primary_text(&self) -> &str {
        &self.title
    }
    fn secondary_text(&self) -> Option<&str> {
        self.description.as_deref()
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateVideoRequest {
    pub title: String,
    pub description: Option<String>,
    pub media_url: String,
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
}

async fn load_all(data: &web::Data<AppState>) -> mongodb::error::Result<Vec<Video>> {
    if let Some(cached) = data.cache.get::<Vec<Video>>(ContentKind::Videos) {
        return Ok(cached);
    }
    let observed_version = data.cache.version(ContentKind::Videos);

    let coll = data.mongodb.collection::<Video>("videos");
    let mut cursor = coll.find(doc! {}).sort(doc! { "created_at": -1 }).await?;
    let mut items = Vec::new();
    while let Some(video) = cursor.next().await {
        items.push(video?);
    }
    data.cache
        .fill_at_version(ContentKind::Videos, observed_version, &items);
    Ok(items)
}

/// GET /videos
pub async fn list_videos(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<VideoListQuery>,
) -> impl Responder {
    if auth::current_user(&req).is_none() {
        return auth::session_expired();
    }

    let items = match load_all(&data).await {
        Ok(items) => items,
        Err(e) => {
            error!("Error fetching videos: {}", e);
            return LoadState::<Video>::failed("Could not load videos").respond();
        }
    };

    let items = filter::apply(
        items,
        query.search.as_deref(),
        SortKey::parse(query.sort.as_deref()),
    );
    LoadState::from_items(items).respond()
}

/// GET /videos/{video_id}
pub async fn get_video(
    req: HttpRequest,
    data: web::Data<AppState>,
    video_id: web::Path<String>,
) -> impl Responder {
    if auth::current_user(&req).is_none() {
        return auth::session_expired();
    }

    let coll = data.mongodb.collection::<Video>("videos");
    match coll.find_one(doc! { "_id": video_id.as_str() }).await {
        Ok(Some(video)) => HttpResponse::Ok().json(video),
        Ok(None) => HttpResponse::NotFound().body("Video not found"),
        Err(e) => {
            error!("Error fetching video: {}", e);
            HttpResponse::InternalServerError().body("Error fetching video")
        }
    }
}

/// POST /videos
pub async fn create_video(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateVideoRequest>,
) -> impl Responder {
    let current_user = match auth::current_user(&req) {
        Some(id) => id,
        None => return auth::session_expired(),
    };
    if let Err(resp) =
        profile::teacher_gate(profile::is_teacher(&data.mongodb, &current_user).await)
    {
        return resp;
    }

    let new_video = Video {
        id: Uuid::new_v4().to_string(),
        title: payload.title.clone(),
        description: payload.description.clone(),
        media_url: payload.media_url.clone(),
        duration: payload.duration.clone(),
        created_at: Utc::now(),
    };

    let coll = data.mongodb.collection::<Video>("videos");
    match coll.insert_one(&new_video).await {
        Ok(_) => {
            info!("Video created: {}", new_video.id);
            data.publish_change(ContentKind::Videos);
            HttpResponse::Ok().json(&new_video)
        }
        Err(e) => {
            error!("Error inserting video: {}", e);
            HttpResponse::InternalServerError().body("Error inserting video")
        }
    }
}

/// PUT /videos/{video_id}
pub async fn update_video(
    req: HttpRequest,
    data: web::Data<AppState>,
    video_id: web::Path<String>,
    payload: web::Json<UpdateVideoRequest>,
) -> impl Responder {
    let current_user = match auth::current_user(&req) {
        Some(id) => id,
        None => return auth::session_expired(),
    };
    if let Err(resp) =
        profile::teacher_gate(profile::is_teacher(&data.mongodb, &current_user).await)
    {
        return resp;
    }

    let mut update_doc = doc! {};
    if let Some(title) = &payload.title {
        update_doc.insert("title", title);
    }
    if let Some(description) = &payload.description {
        update_doc.insert("description", description);
    }
    if let Some(media_url) = &payload.media_url {
        update_doc.insert("media_url", media_url);
    }
    if let Some(duration) = &payload.duration {
        update_doc.insert("duration", duration);
    }
    if update_doc.is_empty() {
        return HttpResponse::BadRequest().body("No fields to update");
    }

    let coll = data.mongodb.collection::<Video>("videos");
    match coll
        .update_one(doc! { "_id": video_id.as_str() }, doc! { "$set": update_doc })
        .await
    {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("Video not found"),
        Ok(_) => {
            data.publish_change(ContentKind::Videos);
            HttpResponse::Ok().body("Video updated")
        }
        Err(e) => {
            error!("Error updating video: {}", e);
            HttpResponse::InternalServerError().body("Error updating video")
        }
    }
}

/// DELETE /videos/{video_id}
pub async fn delete_video(
    req: HttpRequest,
    data: web::Data<AppState>,
    video_id: web::Path<String>,
) -> impl Responder {
    let current_user = match auth::current_user(&req) {
        Some(id) => id,
        None => return auth::session_expired(),
    };
    if let Err(resp) =
        profile::teacher_gate(profile::is_teacher(&data.mongodb, &current_user).await)
    {
        return resp;
    }

    let coll = data.mongodb.collection::<Video>("videos");
    match coll.delete_one(doc! { "_id": video_id.as_str() }).await {
        Ok(res) if res.deleted_count == 0 => {
            HttpResponse::NotFound().body("Video not found or already deleted")
        }
        Ok(_) => {
            data.publish_change(ContentKind::Videos);
            HttpResponse::Ok().body("Video deleted")
        }
        Err(e) => {
            error!("Error deleting video: {}", e);
            HttpResponse::InternalServerError().body("Error deleting video")
        }
    }
}
