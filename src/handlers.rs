use actix_web::{web, HttpResponse};

use crate::artifacts::{ArtifactKind, ArtifactStore};
use crate::models::{HealthResponse, STATUS_ACTIVE};

/// Reports which artifacts are present. Never touches the filesystem.
pub fn check(store: &ArtifactStore) -> HealthResponse {
    HealthResponse {
        status: STATUS_ACTIVE,
        model_loaded: store.contains(ArtifactKind::Model),
        features_loaded: store.contains(ArtifactKind::Features),
    }
}

pub async fn health(store: web::Data<ArtifactStore>) -> HttpResponse {
    HttpResponse::Ok().json(check(&store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_reports_nothing_loaded() {
        let report = check(&ArtifactStore::new());
        assert_eq!(
            report,
            HealthResponse {
                status: "active",
                model_loaded: false,
                features_loaded: false,
            }
        );
    }

    #[test]
    fn body_has_exactly_three_fields() {
        let body = serde_json::to_value(check(&ArtifactStore::new())).unwrap();
        let fields = body.as_object().unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(body["status"], "active");
        assert_eq!(body["model_loaded"], false);
        assert_eq!(body["features_loaded"], false);
    }
}
