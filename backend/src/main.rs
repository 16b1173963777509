mod config;
mod inspection;
mod routes;
mod upload;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use config::AppConfig;
use inspection::{classifier, ClassifierHandle, InspectionPipeline};
use routes::configure_routes;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let classes = config.class_set().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let classifier = match classifier::load(&config.model_path) {
        Ok(handle) => {
            log::info!("Classifier loaded from {}", config.model_path.display());
            handle
        }
        Err(e) => {
            log::warn!("Model not loaded: {}", e);
            log::warn!(
                "Inspections will fail until a model is placed at {} and the service restarted",
                config.model_path.display()
            );
            ClassifierHandle::unloaded()
        }
    };

    let pipeline = InspectionPipeline::new(classifier, classes);
    log::info!(
        "Serving {} vegetable types, max upload {}MB",
        pipeline.classes().len(),
        config.max_upload_mb()
    );

    let bind_address = config.bind_address();
    log::info!("Starting Vegetable Quality Inspector on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(|cfg| configure_routes(cfg, &config))
    })
    .bind(&bind_address)?
    .run()
    .await
}
