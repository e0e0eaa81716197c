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
use crate::profile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTestimonialRequest {
    pub student_name: String,
    pub rating: i32,
    pub comment: String,
}

fn valid_rating(rating: i32) -> bool {
    (1..=5).contains(&rating)
}

async fn load_all(data: &web::Data<AppState>) -> mongodb::error::Result<Vec<Testimonial>> {
    if let Some(cached) = data.cache.get::<Vec<Testimonial>>(ContentKind::Testimonials) {
        return Ok(cached);
    }
    let observed_version = data.cache.version(ContentKind::Testimonials);

    let coll = data.mongodb.collection::<Testimonial>("testimonials");
    let mut cursor = coll.find(doc! {}).sort(doc! { "created_at": -1 }).await?;
    let mut items = Vec::new();
    while let Some(testimonial) = cursor.next().await {
        items.push(testimonial?);
    }
    data.cache
        .fill_at_version(ContentKind::Testimonials, observed_version, &items);
    Ok(items)
}

/// GET /testimonials — rendered on the landing page, so no session guard.
pub async fn list_testimonials(data: web::Data<AppState>) -> impl Responder {
    match load_all(&data).await {
        Ok(items) => LoadState::from_items(items).respond(),
        Err(e) => {
            error!("Error fetching testimonials: {}", e);
            LoadState::<Testimonial>::failed("Could not load testimonials").respond()
        }
    }
}

/// POST /testimonials
pub async fn create_testimonial(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTestimonialRequest>,
) -> impl Responder {
    if auth::current_user(&req).is_none() {
        return auth::session_expired();
    }
    if !valid_rating(payload.rating) {
        return HttpResponse::BadRequest().body("Rating must be between 1 and 5");
    }

    let new_testimonial = Testimonial {
        id: Uuid::new_v4().to_string(),
        student_name: payload.student_name.clone(),
        rating: payload.rating,
        comment: payload.comment.clone(),
        created_at: Utc::now(),
    };

    let coll = data.mongodb.collection::<Testimonial>("testimonials");
    match coll.insert_one(&new_testimonial).await {
        Ok(_) => {
            info!("Testimonial created: {}", new_testimonial.id);
            data.publish_change(ContentKind::Testimonials);
            HttpResponse::Ok().json(&new_testimonial)
        }
        Err(e) => {
            error!("Error inserting testimonial: {}", e);
            HttpResponse::InternalServerError().body("Error inserting testimonial")
        }
    }
}

/// DELETE /testimonials/{testimonial_id} — dashboard moderation.
pub async fn delete_testimonial(
    req: HttpRequest,
    data: web::Data<AppState>,
    testimonial_id: web::Path<String>,
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

    let coll = data.mongodb.collection::<Testimonial>("testimonials");
    match coll
        .delete_one(doc! { "_id": testimonial_id.as_str() })
        .await
    {
        Ok(res) if res.deleted_count == 0 => {
            HttpResponse::NotFound().body("Testimonial not found or already deleted")
        }
        Ok(_) => {
            data.publish_change(ContentKind::Testimonials);
            HttpResponse::Ok().body("Testimonial deleted")
        }
        Err(e) => {
            error!("Error deleting testimonial: {}", e);
            HttpResponse::InternalServerError().body("Error deleting testimonial")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(valid_rating(1));
        assert!(valid_rating(5));
        assert!(!valid_rating(0));
        assert!(!valid_rating(6));
        assert!(!valid_rating(-3));
    }
}
