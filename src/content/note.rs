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

/// Category doubles as the client's color/icon key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteCategory {
    General,
    Important,
    Exam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub body: String,
    pub category: NoteCategory,
    pub created_at: DateTime<Utc>,
}

impl Searchable for Note {
    fn primary_text(&self) -> &str {
        &self.title
    }
    fn secondary_text(&self) -> Option<&str> {
        Some(&self.body)
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    pub body: String,
    pub category: NoteCategory,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub category: Option<NoteCategory>,
}

#[derive(Debug, Deserialize)]
pub struct NoteListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub category: Option<NoteCategory>,
}

async fn load_all(data: &web::Data<AppState>) -> mongodb::error::Result<Vec<Note>> {
    if let Some(cached) = data.cache.get::<Vec<Note>>(ContentKind::Notes) {
        return Ok(cached);
    }
    let observed_version = data.cache.version(ContentKind::Notes);

    let coll = data.mongodb.collection::<Note>("notes");
    let mut cursor = coll.find(doc! {}).sort(doc! { "created_at": -1 }).await?;
    let mut items = Vec::new();
    while let Some(note) = cursor.next().await {
        items.push(note?);
    }
    data.cache
        .fill_at_version(ContentKind::Notes, observed_version, &items);
    Ok(items)
}

/// GET /notes — category filtering stays in memory, like search and sort.
pub async fn list_notes(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<NoteListQuery>,
) -> impl Responder {
    if auth::current_user(&req).is_none() {
        return auth::session_expired();
    }

    let mut items = match load_all(&data).await {
        Ok(items) => items,
        Err(e) => {
            error!("Error fetching notes: {}", e);
            return LoadState::<Note>::failed("Could not load notes").respond();
        }
    };

    if let Some(category) = query.category {
        items.retain(|note| note.category == category);
    }
    let items = filter::apply(
        items,
        query.search.as_deref(),
        SortKey::parse(query.sort.as_deref()),
    );
    LoadState::from_items(items).respond()
}

/// GET /notes/{note_id}
pub async fn get_note(
    req: HttpRequest,
    data: web::Data<AppState>,
    note_id: web::Path<String>,
) -> impl Responder {
    if auth::current_user(&req).is_none() {
        return auth::session_expired();
    }

    let coll = data.mongodb.collection::<Note>("notes");
    match coll.find_one(doc! { "_id": note_id.as_str() }).await {
        Ok(Some(note)) => HttpResponse::Ok().json(note),
        Ok(None) => HttpResponse::NotFound().body("Note not found"),
        Err(e) => {
            error!("Error fetching note: {}", e);
            HttpResponse::InternalServerError().body("Error fetching note")
        }
    }
}

/// POST /notes
pub async fn create_note(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateNoteRequest>,
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

    let new_note = Note {
        id: Uuid::new_v4().to_string(),
        title: payload.title.clone(),
        body: payload.body.clone(),
        category: payload.category,
        created_at: Utc::now(),
    };

    let coll = data.mongodb.collection::<Note>("notes");
    match coll.insert_one(&new_note).await {
        Ok(_) => {
            info!("Note created: {}", new_note.id);
            data.publish_change(ContentKind::Notes);
            HttpResponse::Ok().json(&new_note)
        }
        Err(e) => {
            error!("Error inserting note: {}", e);
            HttpResponse::InternalServerError().body("Error inserting note")
        }
    }
}

/// PUT /notes/{note_id}
pub async fn update_note(
    req: HttpRequest,
    data: web::Data<AppState>,
    note_id: web::Path<String>,
    payload: web::Json<UpdateNoteRequest>,
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
    if let Some(body) = &payload.body {
        update_doc.insert("body", body);
    }
    if let Some(category) = payload.category {
        match mongodb::bson::to_bson(&category) {
            Ok(value) => {
                update_doc.insert("category", value);
            }
            Err(e) => {
                error!("Error encoding category: {}", e);
                return HttpResponse::InternalServerError().body("Error updating note");
            }
        }
    }
    if update_doc.is_empty() {
        return HttpResponse::BadRequest().body("No fields to update");
    }

    let coll = data.mongodb.collection::<Note>("notes");
    match coll
        .update_one(doc! { "_id": note_id.as_str() }, doc! { "$set": update_doc })
        .await
    {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("Note not found"),
        Ok(_) => {
            data.publish_change(ContentKind::Notes);
            HttpResponse::Ok().body("Note updated")
        }
        Err(e) => {
            error!("Error updating note: {}", e);
            HttpResponse::InternalServerError().body("Error updating note")
        }
    }
}

/// DELETE /notes/{note_id}
pub async fn delete_note(
    req: HttpRequest,
    data: web::Data<AppState>,
    note_id: web::Path<String>,
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

    let coll = data.mongodb.collection::<Note>("notes");
    match coll.delete_one(doc! { "_id": note_id.as_str() }).await {
        Ok(res) if res.deleted_count == 0 => {
            HttpResponse::NotFound().body("Note not found or already deleted")
        }
        Ok(_) => {
            data.publish_change(ContentKind::Notes);
            HttpResponse::Ok().body("Note deleted")
        }
        Err(e) => {
            error!("Error deleting note: {}", e);
            HttpResponse::InternalServerError().body("Error deleting note")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_names() {
        assert_eq!(
            serde_json::to_value(NoteCategory::General).unwrap(),
            "general"
        );
        assert_eq!(
            serde_json::to_value(NoteCategory::Important).unwrap(),
            "important"
        );
        assert_eq!(serde_json::to_value(NoteCategory::Exam).unwrap(), "exam");
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(serde_json::from_value::<NoteCategory>(serde_json::json!("urgent")).is_err());
    }
}
