// src/dashboard.rs

use actix_web::{
    error::{ErrorInternalServerError, ErrorUnauthorized},
    web, Error, HttpRequest, HttpResponse,
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};

use crate::app_state::AppState;
use crate::auth;
use crate::content::testimonial::Testimonial;
use crate::content::ContentKind;
use crate::profile;

const KINDS: [ContentKind; 4] = [
    ContentKind::Videos,
    ContentKind::Notes,
    ContentKind::Materials,
    ContentKind::Testimonials,
];

fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i32 = ratings.iter().sum();
    (sum as f64 / ratings.len() as f64 * 10.0).round() / 10.0
}

fn latest_label(latest: Option<&Document>) -> Bson {
    match latest {
        Some(d) => d
            .get_str("title")
            .or_else(|_| d.get_str("student_name"))
            .map(|s| Bson::String(s.to_string()))
            .unwrap_or(Bson::Null),
        None => Bson::Null,
    }
}

/// GET /dashboard/summary — teacher-only aggregate over all four content
/// collections: per-kind counts, the latest entry's label, the average
/// testimonial rating, and the snapshot versions the change feed announces.
pub async fn dashboard_summary(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let current_user =
        auth::current_user(&req).ok_or_else(|| ErrorUnauthorized("Not signed in"))?;
    match profile::is_teacher(&state.mongodb, &current_user).await {
        Ok(true) => {}
        Ok(false) => return Err(ErrorUnauthorized("Teacher role required")),
        Err(e) => return Err(ErrorInternalServerError(e)),
    }

    let mut counts = Document::new();
    let mut latest = Document::new();
    let mut versions = Document::new();

    for kind in KINDS {
        let name = kind.collection_name();
        let coll = state.mongodb.collection::<Document>(name);

        let count = coll
            .count_documents(doc! {})
            .await
            .map_err(ErrorInternalServerError)?;
        counts.insert(name, count as i64);

        let newest = coll
            .find_one(doc! {})
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(ErrorInternalServerError)?;
        latest.insert(name, latest_label(newest.as_ref()));

        versions.insert(name, state.cache.version(kind) as i64);
    }

    let testimonials: Vec<Testimonial> = state
        .mongodb
        .collection::<Testimonial>("testimonials")
        .find(doc! {})
        .await
        .map_err(ErrorInternalServerError)?
        .try_collect()
        .await
        .map_err(ErrorInternalServerError)?;
    let ratings: Vec<i32> = testimonials.iter().map(|t| t.rating).collect();

    let mut summary = Document::new();
    summary.insert("counts", counts);
    summary.insert("latest", latest);
    summary.insert("cacheVersions", versions);
    summary.insert("averageRating", average_rating(&ratings));

    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rating_rounds_to_one_decimal() {
        assert_eq!(average_rating(&[5, 4, 4]), 4.3);
        assert_eq!(average_rating(&[1, 2]), 1.5);
    }

    #[test]
    fn no_ratings_averages_to_zero() {
        assert_eq!(average_rating(&[]), 0.0);
    }

    #[test]
    fn latest_label_prefers_title_then_student_name() {
        let with_title = doc! { "title": "Algebra", "student_name": "Sam" };
        assert_eq!(
            latest_label(Some(&with_title)),
            Bson::String("Algebra".to_string())
        );
        let testimonial = doc! { "student_name": "Sam" };
        assert_eq!(
            latest_label(Some(&testimonial)),
            Bson::String("Sam".to_string())
        );
        assert_eq!(latest_label(None), Bson::Null);
    }
}
