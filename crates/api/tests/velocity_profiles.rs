//! Integration tests for `/api/v1/velocity-profiles` and profile-backed reports.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, window};
use serde_json::{json, Value};
use sqlx::PgPool;

fn job_spec() -> Value {
    json!({
        "calculation_field": "end_time",
        "deployment_route": "cicd_job",
        "deployment_criteria": "job_run_completed",
    })
}

fn create_body(ou_ref_ids: Value) -> Value {
    json!({
        "name": "Platform",
        "ou_ref_ids": ou_ref_ids,
        "config": {
            "deployment_frequency": { "total": job_spec() },
            "change_failure_rate": { "total": job_spec(), "failed": job_spec() },
        },
    })
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_then_get_and_list(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(app.clone(), "/api/v1/velocity-profiles", create_body(json!([10]))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["data"]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["ou_ref_ids"], json!([10]));

    let response = get(app.clone(), &format!("/api/v1/velocity-profiles/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "Platform");

    let response = get(app, "/api/v1/velocity-profiles").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_profile_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/velocity-profiles/999").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unordered_thresholds_are_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut body = create_body(json!([]));
    body["config"]["deployment_frequency"]["thresholds"] =
        json!({ "elite": 0.1, "high": 0.5, "medium": 1.0 });

    let response = post_json(app, "/api/v1/velocity-profiles", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn report_for_stored_profile_with_no_events(pool: PgPool) {
    let app = common::build_test_app(pool);
    post_json(app.clone(), "/api/v1/velocity-profiles", create_body(json!([7]))).await;

    let response = post_json(
        app,
        "/api/v1/dora/change-failure-rate",
        json!({ "ou_ref_id": 7, "filter": window() }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["stats"]["total_deployment"], 0);
    assert_eq!(json["data"]["stats"]["band"], Value::Null);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unsupported_criteria_is_rejected_on_create(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut body = create_body(json!([]));
    body["config"]["deployment_frequency"]["total"]["deployment_criteria"] = json!("pr_merged");

    let response = post_json(app.clone(), "/api/v1/velocity-profiles", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "UNSUPPORTED_CRITERIA");

    let response = get(app, "/api/v1/velocity-profiles").await;
    assert_eq!(body_json(response).await["data"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_filter_key_is_rejected_on_create(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut body = create_body(json!([]));
    body["config"]["change_failure_rate"]["failed"]["filters"] = json!({ "colours": ["red"] });

    let response = post_json(app, "/api/v1/velocity-profiles", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_FILTER");
}
