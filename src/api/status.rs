use actix_web::{
    post,
    web::Data,
    HttpResponse, Responder,
};
use serde::Deserialize;
use validator::Validate;

use crate::progress::Reconciler;

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    #[validate(length(min = 1, message = "source_key must not be empty"))]
    pub source_key: String,
}

/// One progress poll. Read-only; callers repeat it on an interval until the
/// report says `processed`.
#[post("/status")]
pub async fn check_status(
    reconciler: Data<Reconciler>,
    body: actix_web_validator::Json<StatusRequest>,
) -> impl Responder {
    let report = reconciler.check(&body.source_key).await;
    HttpResponse::Ok().json(report)
}
