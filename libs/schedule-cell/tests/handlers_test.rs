use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    schedule_routes(Arc::new(config))
}

fn test_config_for(mock_server: &MockServer) -> TestConfig {
    TestConfig {
        supabase_url: mock_server.uri(),
        ..TestConfig::default()
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Mocks for the happy-path shift upsert: doctor exists, lock is free, no
/// prior shift, no booked slots.
async fn setup_shift_upsert_mocks(mock_server: &MockServer, doctor_id: &str, date: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(doctor_id, "Dr. Test")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    // No shift declared yet for this (doctor, date)
    Mock::given(method("GET"))
        .and(path("/rest/v1/shifts"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/shifts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::shift_row(doctor_id, date, "Morning", "09:00:00", "13:00:00")
        ])))
        .mount(mock_server)
        .await;

    // No booked slots survive from a previous shift
    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("status", "eq.booked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    let slot_rows: Vec<Value> = [
        ("09:00:00", "09:30:00"), ("09:30:00", "10:00:00"),
        ("10:00:00", "10:30:00"), ("10:30:00", "11:00:00"),
        ("11:00:00", "11:30:00"), ("11:30:00", "12:00:00"),
        ("12:00:00", "12:30:00"), ("12:30:00", "13:00:00"),
    ]
    .iter()
    .map(|&(start, end)| {
        MockStoreResponses::slot_row(
            &Uuid::new_v4().to_string(), doctor_id, date, "Morning", start, end, "available",
        )
    })
    .collect();

    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!(slot_rows)))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_create_shift_success() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    setup_shift_upsert_mocks(&mock_server, &doctor.id, "2025-07-01").await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor.id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "9:00 AM",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["slots_created"], json!(8));
    assert_eq!(body["booked_conflicts"], json!([]));
}

#[tokio::test]
async fn test_create_shift_accepts_24_hour_times() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    setup_shift_upsert_mocks(&mock_server, &doctor.id, "2025-07-01").await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor.id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "09:00",
        "end_time": "13:00"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_relabeling_shift_deletes_previous_slots() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let date = "2025-07-01";

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(&doctor.id, "Dr. Test")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // A Morning shift already exists for this date
    Mock::given(method("GET"))
        .and(path("/rest/v1/shifts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::shift_row(&doctor.id, date, "Morning", "09:00:00", "13:00:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/shifts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::shift_row(&doctor.id, date, "Evening", "14:00:00", "18:00:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("status", "eq.booked"))
        .and(query_param_is_missing("shift_label"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // The Morning slots must be deleted even though the new label differs:
    // the delete is keyed by (doctor, date) with no label filter
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("date", format!("eq.{}", date)))
        .and(query_param("status", "eq.available"))
        .and(query_param_is_missing("shift_label"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::slot_row(
                &Uuid::new_v4().to_string(), &doctor.id, date, "Evening",
                "14:00:00", "14:30:00", "available",
            )
        ])))
        .mount(&mock_server)
        .await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor.id,
        "date": date,
        "shift_label": "Evening",
        "start_time": "2:00 PM",
        "end_time": "6:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Matches a slot bulk-insert whose rows skip the interval held by a booked
/// 09:00-09:30 slot.
struct InsertSkipsBookedInterval;

impl wiremock::Match for InsertSkipsBookedInterval {
    fn matches(&self, request: &wiremock::Request) -> bool {
        let rows: Vec<Value> = match serde_json::from_slice(&request.body) {
            Ok(rows) => rows,
            Err(_) => return false,
        };
        rows.len() == 7 && rows.iter().all(|row| row["start_time"] != json!("09:00:00"))
    }
}

#[tokio::test]
async fn test_shift_edit_preserves_booked_slots() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let date = "2025-07-01";
    let booked_slot_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(&doctor.id, "Dr. Test")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/shifts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::shift_row(&doctor.id, date, "Morning", "09:00:00", "13:00:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/shifts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::shift_row(&doctor.id, date, "Morning", "09:00:00", "13:00:00")
        ])))
        .mount(&mock_server)
        .await;

    // One slot from the prior set is booked and must survive
    let mut booked_row = MockStoreResponses::slot_row(
        &booked_slot_id, &doctor.id, date, "Morning", "09:00:00", "09:30:00", "booked",
    );
    booked_row["appointment_id"] = json!(Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("status", "eq.booked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booked_row])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // The insert must skip the interval the booked slot occupies
    let inserted_rows: Vec<Value> = [
        ("09:30:00", "10:00:00"), ("10:00:00", "10:30:00"),
        ("10:30:00", "11:00:00"), ("11:00:00", "11:30:00"),
        ("11:30:00", "12:00:00"), ("12:00:00", "12:30:00"),
        ("12:30:00", "13:00:00"),
    ]
    .iter()
    .map(|&(start, end)| {
        MockStoreResponses::slot_row(
            &Uuid::new_v4().to_string(), &doctor.id, date, "Morning", start, end, "available",
        )
    })
    .collect();

    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .and(InsertSkipsBookedInterval)
        .respond_with(ResponseTemplate::new(201).set_body_json(json!(inserted_rows)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor.id,
        "date": date,
        "shift_label": "Morning",
        "start_time": "9:00 AM",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["slots_created"], json!(7));
    assert_eq!(body["booked_conflicts"][0]["id"], json!(booked_slot_id));
    assert_eq!(body["booked_conflicts"][0]["start_time"], json!("09:00:00"));
}

#[tokio::test]
async fn test_create_shift_rejects_inverted_range() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor.id,
        "date": "2025-07-01",
        "shift_label": "Evening",
        "start_time": "5:00 PM",
        "end_time": "9:00 AM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_shift_rejects_unparseable_time() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor.id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "whenever",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patient_cannot_create_shift() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": patient.id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "9:00 AM",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_cannot_edit_another_doctors_schedule() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let other_doctor_id = Uuid::new_v4();

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": other_doctor_id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "9:00 AM",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_can_create_shift_for_any_doctor() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let doctor_id = Uuid::new_v4().to_string();
    setup_shift_upsert_mocks(&mock_server, &doctor_id, "2025-07-01").await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor_id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "9:00 AM",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_shift_unknown_doctor_returns_404() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor_id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "9:00 AM",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_shift_lock_contention_returns_conflict() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(&doctor.id, "Dr. Test")
        ])))
        .mount(&mock_server)
        .await;

    // Lock row already held, not yet expired
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "lock_key": "shift_lock",
            "doctor_id": doctor.id,
            "acquired_at": chrono::Utc::now().to_rfc3339(),
            "expires_at": (chrono::Utc::now() + chrono::Duration::seconds(25)).to_rfc3339(),
            "process_id": "scheduler_other"
        }])))
        .mount(&mock_server)
        .await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "doctor_id": doctor.id,
        "date": "2025-07-01",
        "shift_label": "Morning",
        "start_time": "9:00 AM",
        "end_time": "1:00 PM"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedule")
                .header("Authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_check_availability_returns_slots() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "eq.available"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::slot_row(
                &Uuid::new_v4().to_string(), &doctor_id, "2025-07-01",
                "Morning", "09:00:00", "09:30:00", "available",
            ),
            MockStoreResponses::slot_row(
                &Uuid::new_v4().to_string(), &doctor_id, "2025-07-01",
                "Morning", "09:30:00", "10:00:00", "available",
            ),
        ])))
        .mount(&mock_server)
        .await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/availability?doctor_id={}&date=2025-07-01", doctor_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], json!(2));
    assert_eq!(body["available_slots"][0]["start_time"], json!("09:00:00"));
}

#[tokio::test]
async fn test_check_availability_empty_is_ok() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/availability?doctor_id={}&date=2025-07-01", doctor_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], json!(0));
    assert_eq!(body["available_slots"], json!([]));
}

#[tokio::test]
async fn test_available_dates_deduplicated() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("select", "date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"date": "2025-07-01"},
            {"date": "2025-07-01"},
            {"date": "2025-07-03"},
        ])))
        .mount(&mock_server)
        .await;

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/doctors/{}/available-dates", doctor_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["available_dates"], json!(["2025-07-01", "2025-07-03"]));
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config_for(&mock_server);
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/availability?doctor_id={}&date=2025-07-01", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    let config = test_config_for(&mock_server);
    let token = JwtTestUtils::create_expired_token(&doctor, &config.jwt_secret);
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/schedule/doctors/{}", doctor.id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
