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

/// The three fixed grade buckets the materials page tabs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Grade10,
    Grade11,
    Grade12,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub grade: Grade,
    /// Download URL from the external file storage.
    pub file_url: String,
    pub file_size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl Searchable for Material {
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
pub struct CreateMaterialRequest {
    pub title: String,
    pub description: Option<String>,
    pub grade: Grade,
    pub file_url: String,
    pub file_size_bytes: i64,
}

#[derive(Debug, Deserialize)]
pub struct MaterialListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub grade: Option<Grade>,
}

async fn load_all(data: &web::Data<AppState>) -> mongodb::error::Result<Vec<Material>> {
    if let Some(cached) = data.cache.get::<Vec<Material>>(ContentKind::Materials) {
        return Ok(cached);
    }
    let observed_version = data.cache.version(ContentKind::Materials);

    let coll = data.mongodb.collection::<Material>("materials");
    let mut cursor = coll.find(doc! {}).sort(doc! { "created_at": -1 }).await?;
    let mut items = Vec::new();
    while let Some(material) = cursor.next().await {
        items.push(material?);
    }
    data.cache
        .fill_at_version(ContentKind::Materials, observed_version, &items);
    Ok(items)
}

/// GET /materials — the grade tab is applied after retrieval, not pushed
/// into the query, so one snapshot serves all three tabs.
pub async fn list_materials(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<MaterialListQuery>,
) -> impl Responder {
    if auth::current_user(&req).is_none() {
        return auth::session_expired();
    }

    let mut items = match load_all(&data).await {
        Ok(items) => items,
        Err(e) => {
            error!("Error fetching materials: {}", e);
            return LoadState::<Material>::failed("Could not load materials").respond();
        }
    };

    if let Some(grade) = query.grade {
        items.retain(|material| material.grade == grade);
    }
    let items = filter::apply(
        items,
        query.search.as_deref(),
        SortKey::parse(query.sort.as_deref()),
    );
    LoadState::from_items(items).respond()
}

/// GET /materials/{material_id}
pub async fn get_material(
    req: HttpRequest,
    data: web::Data<AppState>,
    material_id: web::Path<String>,
) -> impl Responder {
    if auth::current_user(&req).is_none() {
        return auth::session_expired();
    }

    let coll = data.mongodb.collection::<Material>("materials");
    match coll.find_one(doc! { "_id": material_id.as_str() }).await {
        Ok(Some(material)) => HttpResponse::Ok().json(material),
        Ok(None) => HttpResponse::NotFound().body("Material not found"),
        Err(e) => {
            error!("Error fetching material: {}", e);
            HttpResponse::InternalServerError().body("Error fetching material")
        }
    }
}

/// POST /materials
pub async fn create_material(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateMaterialRequest>,
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

    let new_material = Material {
        id: Uuid::new_v4().to_string(),
        title: payload.title.clone(),
        description: payload.description.clone(),
        grade: payload.grade,
        file_url: payload.file_url.clone(),
        file_size_bytes: payload.file_size_bytes,
        created_at: Utc::now(),
    };

    let coll = data.mongodb.collection::<Material>("materials");
    match coll.insert_one(&new_material).await {
        Ok(_) => {
            info!("Material created: {}", new_material.id);
            data.publish_change(ContentKind::Materials);
            HttpResponse::Ok().json(&new_material)
        }
        Err(e) => {
            error!("Error inserting material: {}", e);
            HttpResponse::InternalServerError().body("Error inserting material")
        }
    }
}

/// DELETE /materials/{material_id} — the stored file itself is deleted
/// through the file-storage service by the dashboard client.
pub async fn delete_material(
    req: HttpRequest,
    data: web::Data<AppState>,
    material_id: web::Path<String>,
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

    let coll = data.mongodb.collection::<Material>("materials");
    match coll.delete_one(doc! { "_id": material_id.as_str() }).await {
        Ok(res) if res.deleted_count == 0 => {
            HttpResponse::NotFound().body("Material not found or already deleted")
        }
        Ok(_) => {
            data.publish_change(ContentKind::Materials);
            HttpResponse::Ok().body("Material deleted")
        }
        Err(e) => {
            error!("Error deleting material: {}", e);
            HttpResponse::InternalServerError().body("Error deleting material")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_wire_names() {
        assert_eq!(serde_json::to_value(Grade::Grade10).unwrap(), "grade10");
        assert_eq!(serde_json::to_value(Grade::Grade12).unwrap(), "grade12");
    }

    #[test]
    fn grade_outside_the_three_buckets_is_rejected() {
        assert!(serde_json::from_value::<Grade>(serde_json::json!("grade9")).is_err());
    }
}
