use actix_multipart::form::{bytes::Bytes, text::Text, MultipartForm};
use actix_web::{
    post,
    web::{Data, ServiceConfig, scope},
    HttpResponse, Responder,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::api::validation::ErrorResponse;
use crate::models::ModelRegistry;
use crate::orchestrator::{JobOrchestrator, UploadJob};
use crate::pipeline;

#[derive(Debug, MultipartForm)]
pub struct UploadForm {
    #[multipart(rename = "file")]
    pub file: Bytes,
    /// Optional explicit model name; auto-detected when absent
    pub model: Option<Text<String>>,
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    model: String,
    job: UploadJob,
}

/// Accept a CSV upload, resolve its model, and start a processing run.
///
/// Detection problems abort here, before any row is touched; the runner
/// being at capacity is not an error (the job comes back with a pending id).
#[post("")]
async fn upload_csv(
    orchestrator: Data<JobOrchestrator>,
    registry: Data<ModelRegistry>,
    MultipartForm(form): MultipartForm<UploadForm>,
) -> impl Responder {
    let filename = form.file.file_name.clone().unwrap_or_default();
    if !filename.to_lowercase().ends_with(".csv") {
        return bad_request("Please upload a CSV file");
    }

    let bytes = form.file.data.to_vec();
    let columns = match pipeline::read_columns(&bytes) {
        Ok(columns) => columns,
        Err(e) => {
            warn!(%filename, error = %e, "unreadable CSV upload");
            return bad_request(&format!("Invalid CSV data: {e}"));
        }
    };

    let model_name = form.model.map(|m| m.0);
    let model = match registry.validate(&columns, model_name.as_deref()) {
        Ok(model) => model,
        Err(e) => {
            warn!(%filename, error = %e, "model detection failed");
            return bad_request(&e.to_string());
        }
    };

    match orchestrator.start(&filename, bytes, Some(model.name)).await {
        Ok(job) => {
            let message = if job.is_pending() {
                "File uploaded; processing queued until a run slot frees up".to_string()
            } else {
                "File uploaded and processing started".to_string()
            };
            HttpResponse::Ok().json(UploadResponse {
                success: true,
                message,
                model: model.name.to_string(),
                job,
            })
        }
        Err(e) => {
            error!(%filename, error = %e, "upload failed");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to start processing".to_string(),
                fields: serde_json::json!({ "message": e.to_string() }),
            })
        }
    }
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Upload rejected".to_string(),
        fields: serde_json::json!({ "message": message }),
    })
}

pub fn upload_config(config: &mut ServiceConfig) {
    config.service(
        scope("uploads")
            .service(upload_csv)
            .service(crate::api::status::check_status),
    );
}
