use std::collections::BTreeMap;
use std::path::PathBuf;

use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::{header, StatusCode};
use actix_web::{guard, web, HttpRequest, HttpResponse, ResponseError};
use chrono::{Local, Utc};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{
    CaptureRequest, ErrorResponse, HealthResponse, InspectionResponse, QualityCategoriesResponse,
    QualityCategory, VegetablesResponse,
};
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::inspection::{ErrorClass, InspectionPipeline, PipelineError};
use crate::upload;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("No image provided")]
    NoImage,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Invalid file type. Supported formats: {0}")]
    UnsupportedType(String),
    #[error("File too large (max {0}MB)")]
    TooLarge(f64),
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error("Bad request")]
    BadRequest,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Internal server error occurred")]
    Internal,
}

impl RequestError {
    /// Message safe to show to the caller; server-side detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            RequestError::Pipeline(PipelineError::ModelNotReady) => {
                "Model not loaded, try again later".to_string()
            }
            RequestError::Pipeline(PipelineError::ShapeMismatch { .. }) => {
                "Image could not be normalized for inspection".to_string()
            }
            RequestError::Pipeline(e) if e.class() == ErrorClass::Server => {
                "Internal server error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            RequestError::NoImage
            | RequestError::NoFileSelected
            | RequestError::UnsupportedType(_)
            | RequestError::Multipart(_)
            | RequestError::BadRequest => StatusCode::BAD_REQUEST,
            RequestError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::Pipeline(PipelineError::ModelNotReady) => StatusCode::SERVICE_UNAVAILABLE,
            RequestError::Pipeline(e) => match e.class() {
                ErrorClass::Client => StatusCode::BAD_REQUEST,
                ErrorClass::Server => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RequestError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.public_message(),
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, config: &AppConfig) {
    cfg.service(
        web::resource("/inspect")
            .app_data(capture_json_config(config.max_upload_bytes, config.max_upload_mb()))
            .route(
                web::post()
                    .guard(guard::fn_guard(is_multipart))
                    .to(inspect_upload),
            )
            .route(web::post().to(inspect_capture)),
    )
    .service(web::resource("/health").route(web::get().to(health)))
    .service(web::resource("/vegetables").route(web::get().to(vegetables)))
    .service(web::resource("/quality-categories").route(web::get().to(quality_categories)));

    if let Some(dir) = static_dir(config) {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

fn static_dir(config: &AppConfig) -> Option<PathBuf> {
    let dir = config.static_dir.as_ref()?;
    if dir.is_dir() {
        Some(dir.clone())
    } else {
        warn!("Static directory {} not found, front-end disabled", dir.display());
        None
    }
}

fn is_multipart(ctx: &guard::GuardContext<'_>) -> bool {
    ctx.head()
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

/// Base64 inflates payloads by a third; leave room for a data-URL prefix too.
fn capture_json_config(max_upload_bytes: u64, max_upload_mb: f64) -> web::JsonConfig {
    let limit = (max_upload_bytes as usize).saturating_mul(4) / 3 + 1024;
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(move |err, _req: &HttpRequest| {
            let request_error = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    RequestError::TooLarge(max_upload_mb)
                }
                JsonPayloadError::ContentType => RequestError::NoImage,
                other => {
                    warn!("Rejected capture payload: {}", other);
                    RequestError::BadRequest
                }
            };
            InternalError::from_response(err, request_error.error_response()).into()
        })
}

async fn inspect_upload(
    pipeline: web::Data<InspectionPipeline>,
    config: web::Data<AppConfig>,
    mut payload: Multipart,
) -> Result<HttpResponse, RequestError> {
    let mut received: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| RequestError::Multipart(e.to_string()))?
    {
        if received.is_some() || field.name() != Some("file") {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| RequestError::Multipart(e.to_string()))?
        {
            if (data.len() + chunk.len()) as u64 > config.max_upload_bytes {
                return Err(RequestError::TooLarge(config.max_upload_mb()));
            }
            data.extend_from_slice(&chunk);
        }
        received = Some((filename, data));
    }

    let (filename, data) = received.ok_or(RequestError::NoImage)?;
    if filename.is_empty() {
        return Err(RequestError::NoFileSelected);
    }
    let allowed = upload::extension(&filename)
        .map(|ext| config.is_allowed_extension(&ext))
        .unwrap_or(false);
    if !allowed {
        return Err(RequestError::UnsupportedType(
            config.allowed_extensions.join(", "),
        ));
    }

    run_inspection(pipeline, data, upload::sanitize_filename(&filename)).await
}

async fn inspect_capture(
    pipeline: web::Data<InspectionPipeline>,
    config: web::Data<AppConfig>,
    body: web::Json<CaptureRequest>,
) -> Result<HttpResponse, RequestError> {
    let encoded = body.into_inner().image.ok_or(RequestError::NoImage)?;
    let data = upload::decode_base64_image(&encoded)?;
    if data.len() as u64 > config.max_upload_bytes {
        return Err(RequestError::TooLarge(config.max_upload_mb()));
    }

    run_inspection(pipeline, data, upload::camera_capture_filename(Local::now())).await
}

async fn run_inspection(
    pipeline: web::Data<InspectionPipeline>,
    image: Vec<u8>,
    filename: String,
) -> Result<HttpResponse, RequestError> {
    let request_id = Uuid::new_v4();
    let name = filename.clone();

    let result = web::block(move || pipeline.inspect(&image, Some(name)))
        .await
        .map_err(|e| {
            error!("Inspection {} did not complete: {:?}", request_id, e);
            RequestError::Internal
        })?;

    match result {
        Ok(assessment) => {
            info!(
                "Quality inspection {} completed: {} -> {} ({})",
                request_id, filename, assessment.vegetable_type, assessment.quality_category
            );
            Ok(HttpResponse::Ok().json(InspectionResponse {
                success: true,
                assessment,
            }))
        }
        Err(e) => {
            // a shape mismatch is reported to the client but points at a bug here
            if e.is_client_error() && !matches!(e, PipelineError::ShapeMismatch { .. }) {
                warn!("Inspection {} rejected {}: {}", request_id, filename, e);
            } else {
                error!("Inspection {} failed for {}: {:?}", request_id, filename, e);
            }
            Err(e.into())
        }
    }
}

async fn health(
    pipeline: web::Data<InspectionPipeline>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    let model_loaded = pipeline.is_ready();
    HttpResponse::Ok().json(HealthResponse {
        status: (if model_loaded { "healthy" } else { "unhealthy" }).to_string(),
        model_loaded,
        supported_formats: config.allowed_extensions.clone(),
        max_file_size_mb: config.max_upload_mb(),
        vegetable_types: pipeline.classes().labels().to_vec(),
        quality_categories: QualityCategory::iter().collect(),
        timestamp: Utc::now(),
    })
}

async fn vegetables(pipeline: web::Data<InspectionPipeline>) -> HttpResponse {
    let vegetables = pipeline.classes().labels().to_vec();
    HttpResponse::Ok().json(VegetablesResponse {
        count: vegetables.len(),
        vegetables,
    })
}

async fn quality_categories() -> HttpResponse {
    let categories: BTreeMap<_, _> = QualityCategory::iter().map(|c| (c, c.info())).collect();
    HttpResponse::Ok().json(QualityCategoriesResponse {
        count: categories.len(),
        categories,
    })
}
