pub mod material;
pub mod note;
pub mod testimonial;
pub mod video;

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

/// The four content collections the public pages render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Videos,
    Notes,
    Materials,
    Testimonials,
}

impl ContentKind {
    pub fn collection_name(self) -> &'static str {
        match self {
            ContentKind::Videos => "videos",
            ContentKind::Notes => "notes",
            ContentKind::Materials => "materials",
            ContentKind::Testimonials => "testimonials",
        }
    }
}

/// Lifecycle of one fetch-and-render pass. Serialized with a `state` tag so
/// the client can switch between spinner, empty block, cards and error block
/// without inspecting anything else.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LoadState<T> {
    Loading,
    Empty,
    Populated { items: Vec<T> },
    Failed { message: String },
}

impl<T> LoadState<T> {
    /// A successful query with zero records is `Empty`, never `Populated([])`.
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            LoadState::Empty
        } else {
            LoadState::Populated { items }
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        LoadState::Failed {
            message: message.into(),
        }
    }

    pub fn respond(&self) -> HttpResponse
    where
        T: Serialize,
    {
        match self {
            LoadState::Failed { .. } => HttpResponse::InternalServerError().json(self),
            _ => HttpResponse::Ok().json(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_records_is_empty_not_populated() {
        let state = LoadState::<String>::from_items(vec![]);
        assert!(matches!(state, LoadState::Empty));
        assert_eq!(state.respond().status(), 200);
    }

    #[test]
    fn records_are_populated() {
        let state = LoadState::from_items(vec!["a".to_string()]);
        match &state {
            LoadState::Populated { items } => assert_eq!(items.len(), 1),
            other => panic!("expected populated, got {:?}", other),
        }
    }

    #[test]
    fn failure_responds_500_without_throwing() {
        let state = LoadState::<String>::failed("store unreachable");
        assert_eq!(state.respond().status(), 500);
    }

    #[test]
    fn state_tag_shape() {
        let json = serde_json::to_value(LoadState::<String>::Loading).unwrap();
        assert_eq!(json["state"], "loading");
        let json = serde_json::to_value(LoadState::<String>::Empty).unwrap();
        assert_eq!(json["state"], "empty");
        let json =
            serde_json::to_value(LoadState::from_items(vec!["x".to_string()])).unwrap();
        assert_eq!(json["state"], "populated");
        assert_eq!(json["items"][0], "x");
    }
}
