//! The backend for the Pulse fitness studio's class booking site

mod email;
mod error;
mod graphql;
mod models;
mod util;

use std::net::SocketAddr;

use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::{Request, Response};
use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::error::ApiError;
use crate::graphql::build_schema;
use crate::models::member::Member;
use crate::util::connect_to_db;

const PULSE_TOKEN: &str = "PULSE_TOKEN";
const API_URL: &str = "api.pulsefitness.studio";

/// How often the class reminder loop wakes up, in seconds
const REMINDER_INTERVAL_SECONDS: u64 = 60 * 60 * 24;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let pool = connect_to_db().await?;
    tokio::spawn(email::run_reminder_loop(
        REMINDER_INTERVAL_SECONDS,
        pool.clone(),
    ));

    let app = Router::new()
        .route("/", get(playground).post(query))
        .layer(CorsLayer::permissive())
        .layer(Extension(pool));

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn query(
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Json(request): Json<Request>,
) -> Result<Json<Response>, ApiError> {
    let user = if let Some(token) = get_token(&headers)? {
        Some(
            Member::with_token(token, &pool)
                .await
                .map_err(|err| ApiError::Unauthorized(err.message))?,
        )
    } else {
        None
    };

    let request = Request::new(request.query)
        .variables(request.variables)
        .data(pool);
    let request = if let Some(user) = user {
        request.data(user)
    } else {
        request
    };

    Ok(Json(build_schema().execute(request).await))
}

async fn playground(headers: HeaderMap) -> Result<String, ApiError> {
    let mut config = GraphQLPlaygroundConfig::new(API_URL);
    if let Some(header) = get_token(&headers)? {
        config = config.with_header(PULSE_TOKEN, header);
    }

    Ok(playground_source(config))
}

fn get_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .iter()
        .find_map(|(name, value)| {
            if name == PULSE_TOKEN {
                Some(value.to_str().map_err(ApiError::InvalidTokenHeader))
            } else {
                None
            }
        })
        .transpose()
}
