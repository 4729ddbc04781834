use actix_web::{
    get,
    web::{Data, ServiceConfig, scope},
    HttpResponse, Responder,
};
use serde::Serialize;

use crate::models::ModelRegistry;

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<&'static str>,
}

/// The record models this deployment can ingest.
#[get("")]
async fn list_models(registry: Data<ModelRegistry>) -> impl Responder {
    HttpResponse::Ok().json(ModelsResponse {
        models: registry.model_names(),
    })
}

pub fn models_config(config: &mut ServiceConfig) {
    config.service(scope("models").service(list_models));
}
