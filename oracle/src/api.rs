use std::time::Duration;

use ::metrics::{
    HealthChecker,
    prometheus::{self, Encoder, Registry, TextEncoder},
};
use actix_web::{
    App, HttpResponse, HttpServer, Responder, error::InternalError, http::StatusCode, web,
};
use serde::Deserialize;
use services::{BlockNumberOrTag, ChainBackend, FeeHistoryResolver, HealthReporter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    config::Config,
    errors::{Error, Result},
};

pub struct AppState<B> {
    pub resolver: FeeHistoryResolver<B>,
    pub health_reporter: HealthReporter,
    pub registry: Registry,
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

pub async fn launch_api_server<B>(
    config: &Config,
    resolver: FeeHistoryResolver<B>,
    metrics_registry: Registry,
    eth_health_check: HealthChecker,
    shutdown: CancellationToken,
) -> Result<()>
where
    B: ChainBackend + Send + Sync + 'static,
{
    let state = web::Data::new(AppState {
        resolver,
        health_reporter: HealthReporter::new(eth_health_check),
        registry: metrics_registry,
        shutdown,
        request_timeout: config.app.request_timeout,
    });

    info!(
        "serving fee history on {}:{}",
        config.app.host, config.app.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::<B>)
    })
    .bind((config.app.host, config.app.port))
    .map_err(|e| Error::Other(e.to_string()))?
    .run()
    .await
    .map_err(|e| Error::Other(e.to_string()))
}

pub fn routes<B>(cfg: &mut web::ServiceConfig)
where
    B: ChainBackend + Send + Sync + 'static,
{
    cfg.route("/fee_history", web::post().to(fee_history::<B>))
        .route("/health", web::get().to(health::<B>))
        .route("/metrics", web::get().to(metrics::<B>));
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeHistoryRequest {
    block_count: u64,
    newest_block: BlockNumberOrTag,
    #[serde(default)]
    reward_percentiles: Vec<f64>,
}

async fn fee_history<B>(
    state: web::Data<AppState<B>>,
    request: web::Json<FeeHistoryRequest>,
) -> Result<HttpResponse>
where
    B: ChainBackend + Send + Sync + 'static,
{
    let request = request.into_inner();
    debug!("fee history request: {request:?}");

    let cancel = state.shutdown.child_token();
    let timeout = tokio::spawn({
        let cancel = cancel.clone();
        let request_timeout = state.request_timeout;
        async move {
            tokio::time::sleep(request_timeout).await;
            cancel.cancel();
        }
    });

    let history = state
        .resolver
        .fee_history(
            &cancel,
            request.block_count,
            request.newest_block,
            &request.reward_percentiles,
        )
        .await;
    timeout.abort();

    Ok(HttpResponse::Ok().json(history?))
}

async fn health<B: 'static>(state: web::Data<AppState<B>>) -> impl Responder {
    let report = state.health_reporter.generate_report();

    let mut response = if report.is_healthy() {
        HttpResponse::Ok()
    } else {
        HttpResponse::InternalServerError()
    };

    response.json(report)
}

async fn metrics<B: 'static>(state: web::Data<AppState<B>>) -> impl Responder {
    let encoder = TextEncoder::new();
    let mut buf: Vec<u8> = vec![];
    let mut encode = |metrics: &_| {
        encoder
            .encode(metrics, &mut buf)
            .map_err(map_to_internal_err)
    };

    encode(&state.registry.gather())?;
    encode(&prometheus::gather())?;

    let text = String::from_utf8(buf).map_err(map_to_internal_err)?;

    std::result::Result::<_, InternalError<_>>::Ok(text)
}

fn map_to_internal_err(error: impl std::error::Error) -> InternalError<String> {
    InternalError::new(error.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
}
