//! HTTP surface tests against the in-memory store

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tourdesk_api::configure_routes;
use tourdesk_auth::JwtService;
use tourdesk_core::config::BookingConfig;
use tourdesk_core::models::{
    Actor, ChargeRequest, ChargeResult, NewExcursion, PaymentStatus, RefundRequest, RefundResult,
    Session, SessionDraft, UserRole,
};
use tourdesk_core::traits::{ExcursionRepository, PaymentGateway, SessionRepository};
use tourdesk_core::AppError;
use tourdesk_db::MemoryBookingStore;
use tourdesk_services::{BookingServices, LocalPhotoStore, LogNotifier, ServiceDeps};

const SECRET: &str = "http-test-secret";

/// Gateway that accepts every charge and refund
#[derive(Default)]
struct AcceptingGateway {
    charges: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for AcceptingGateway {
    async fn charge(&self, _request: &ChargeRequest) -> Result<ChargeResult, AppError> {
        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ChargeResult {
            gateway_payment_id: format!("pay-{}", n),
            status: PaymentStatus::Created,
            confirmation_url: Some(format!("https://pay.example.com/pay-{}", n)),
        })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, AppError> {
        Ok(RefundResult {
            refund_id: format!("refund-{}", request.gateway_payment_id),
            status: "succeeded".to_string(),
        })
    }
}

struct TestState {
    store: Arc<MemoryBookingStore>,
    services: BookingServices,
    jwt: Arc<JwtService>,
}

impl TestState {
    fn new() -> Self {
        let store = Arc::new(MemoryBookingStore::new());
        let services = BookingServices::new(ServiceDeps {
            store: store.clone(),
            gateway: Arc::new(AcceptingGateway::default()),
            notifier: Arc::new(LogNotifier),
            photos: Arc::new(LocalPhotoStore::new(
                std::env::temp_dir().join("tourdesk-http-tests"),
            )),
            cache: None,
            currency: "RUB".to_string(),
            gateway_timeout: std::time::Duration::from_secs(5),
            webhook_ttl_secs: 60,
            schedule_horizon_days: 28,
            tz: chrono_tz::Europe::Moscow,
        });

        Self {
            store,
            services,
            jwt: Arc::new(JwtService::new(SECRET, 3600)),
        }
    }

    fn bearer(&self, user_id: i64, role: UserRole) -> (&'static str, String) {
        let actor = Actor::new(user_id, format!("user{}@example.com", user_id), role);
        let token = self.jwt.create_token_for_actor(&actor).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }

    async fn session(&self, owner_id: i64, capacity: i32, cost: Decimal) -> Session {
        let excursion = self
            .store
            .create_excursion(
                owner_id,
                &NewExcursion {
                    title: "Old town walk".to_string(),
                    description: "Two hours through the historic centre".to_string(),
                    place: "Central square".to_string(),
                    contact_email: Some("guide@example.com".to_string()),
                    photo_urls: vec![],
                },
            )
            .await
            .unwrap();

        self.store
            .create_session(
                excursion.id,
                &SessionDraft {
                    start_at: Utc::now() + Duration::days(3),
                    max_participants: capacity,
                    cost,
                },
            )
            .await
            .unwrap()
    }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.services.clone()))
                .app_data(web::Data::new($state.jwt.clone()))
                .app_data(web::Data::new(BookingConfig::default()))
                .configure(configure_routes),
        )
        .await
    };
}

fn booking(name: &str, seats: i32) -> serde_json::Value {
    serde_json::json!({
        "full_name": name,
        "phone_number": "+79001234567",
        "email": "anna@example.com",
        "participants_count": seats,
    })
}

#[actix_rt::test]
async fn test_health() {
    let state = TestState::new();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_excursion_details_show_availability() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(0)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 3))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/excursions/{}", session.excursion_id))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["title"], "Old town walk");
    assert_eq!(body["data"]["sessions"][0]["booked"], 3);
    assert_eq!(body["data"]["sessions"][0]["available"], 5);
}

#[actix_rt::test]
async fn test_booking_requires_token() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(0)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .set_json(booking("Anna Petrova", 1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_over_capacity_is_conflict() {
    let state = TestState::new();
    let session = state.session(10, 4, dec!(0)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 3))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["reservation"]["is_paid"], true);
    assert_eq!(body["data"]["reservation"]["state"], "paid");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(21, UserRole::User))
        .set_json(booking("Ivan Ivanov", 2))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "capacity_exceeded");
}

#[actix_rt::test]
async fn test_invalid_booking_is_bad_request() {
    let state = TestState::new();
    let session = state.session(10, 4, dec!(0)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 0))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_paid_booking_confirmed_by_webhook() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(1500)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 2))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["payment_url"], "https://pay.example.com/pay-1");
    assert_eq!(body["data"]["reservation"]["state"], "pending");
    let reservation_id = body["data"]["reservation"]["id"].as_i64().unwrap();

    let webhook = serde_json::json!({
        "type": "notification",
        "event": "payment.succeeded",
        "object": {
            "id": "pay-1",
            "status": "succeeded",
            "metadata": {"reservation_id": reservation_id.to_string()}
        }
    });
    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/payments")
        .set_json(&webhook)
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "applied");

    // Redelivery is acknowledged without effect
    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/payments")
        .set_json(&webhook)
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "duplicate");

    let req = test::TestRequest::get()
        .uri("/api/v1/reservations/mine")
        .insert_header(state.bearer(20, UserRole::User))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["id"], reservation_id);
    assert_eq!(body["data"][0]["state"], "paid");
}

#[actix_rt::test]
async fn test_malformed_webhook_is_rejected() {
    let state = TestState::new();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/payments")
        .set_payload("not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/payments")
        .set_json(serde_json::json!({"event": "payment.waiting_for_capture", "object": {}}))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ignored");
}

#[actix_rt::test]
async fn test_owner_cancel_is_one_way() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(0)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 1))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["reservation"]["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/reservations/{}/cancel", id))
        .insert_header(state.bearer(21, UserRole::User))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/reservations/{}/cancel", id))
        .insert_header(state.bearer(20, UserRole::User))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["is_cancelled"], true);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/reservations/{}/cancel", id))
        .insert_header(state.bearer(20, UserRole::User))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_rt::test]
async fn test_session_delete_exports_csv() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(0)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 2))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Not the owner
    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/v1/excursions/{}/sessions/{}",
            session.excursion_id, session.id
        ))
        .insert_header(state.bearer(11, UserRole::Resident))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/v1/excursions/{}/sessions/{}?export=csv",
            session.excursion_id, session.id
        ))
        .insert_header(state.bearer(10, UserRole::Resident))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let disposition = resp
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains(&format!(
        "filename*=UTF-8''cancelled_reservations_session_{}.csv",
        session.id
    )));

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"\xEF\xBB\xBF"));
    let text = String::from_utf8(body[3..].to_vec()).unwrap();
    assert!(text.starts_with("reservation_id;full_name;"));
    assert!(text.contains("Anna Petrova"));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/excursions/{}", session.excursion_id))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 0);
}

#[actix_rt::test]
async fn test_publishing_and_session_management() {
    let state = TestState::new();
    let app = app!(state);

    let excursion = serde_json::json!({
        "title": "River cruise",
        "description": "Evening boat trip",
        "place": "North pier",
        "photo_urls": ["cruise/deck.jpg"]
    });

    let req = test::TestRequest::post()
        .uri("/api/v1/excursions")
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(&excursion)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/v1/excursions")
        .insert_header(state.bearer(10, UserRole::Resident))
        .set_json(&excursion)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let excursion_id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/excursions/{}/sessions", excursion_id))
        .insert_header(state.bearer(10, UserRole::Resident))
        .set_json(serde_json::json!({
            "start_at": "2030-06-01T18:00:00+03:00",
            "max_participants": 30,
            "cost": 2500
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let session_id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!(
            "/api/v1/excursions/{}/sessions/{}",
            excursion_id, session_id
        ))
        .insert_header(state.bearer(10, UserRole::Resident))
        .set_json(serde_json::json!({
            "start_at": "not a time",
            "max_participants": 30
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/excursions?owner=me")
        .insert_header(state.bearer(10, UserRole::Resident))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/excursions?owner=me")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_admin_routes_require_admin() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(1500)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 2))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["reservation"]["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/housekeeping/purge-unpaid?older_than_minutes=0")
        .insert_header(state.bearer(10, UserRole::Resident))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/reservations/{}", id))
        .insert_header(state.bearer(1, UserRole::Admin))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["state"], "cancelled");
    assert_eq!(body["data"]["is_paid"], false);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/housekeeping/purge-unpaid")
        .insert_header(state.bearer(1, UserRole::Admin))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["count"], 0);
}

#[actix_rt::test]
async fn test_purge_window_out_of_range_is_bad_request() {
    let state = TestState::new();
    let app = app!(state);

    for minutes in [i64::MAX.to_string(), "100000000000000".to_string()] {
        let req = test::TestRequest::post()
            .uri(&format!(
                "/api/v1/admin/housekeeping/purge-unpaid?older_than_minutes={}",
                minutes
            ))
            .insert_header(state.bearer(1, UserRole::Admin))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "window {}", minutes);
    }
}

#[actix_rt::test]
async fn test_session_cost_beyond_payable_amount_is_bad_request() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(0)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/excursions/{}/sessions", session.excursion_id))
        .insert_header(state.bearer(10, UserRole::Resident))
        .set_json(serde_json::json!({
            "start_at": "2030-01-01T10:00:00Z",
            "max_participants": 5,
            "cost": "1000000000000"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_weekly_schedule_lifecycle() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(0)).await;
    let excursion_id = session.excursion_id;
    let app = app!(state);

    let tomorrow = Utc::now().with_timezone(&chrono_tz::Europe::Moscow).date_naive() + Duration::days(1);
    let schedule = serde_json::json!({
        "weekday": tomorrow.weekday().num_days_from_sunday(),
        "start_time": "10:00",
        "max_participants": 12,
        "cost": "800"
    });

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/excursions/{}/schedules", excursion_id))
        .insert_header(state.bearer(30, UserRole::Resident))
        .set_json(&schedule)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/excursions/{}/schedules", excursion_id))
        .insert_header(state.bearer(10, UserRole::Resident))
        .set_json(serde_json::json!({
            "weekday": 7,
            "start_time": "10:00",
            "max_participants": 12
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/excursions/{}/schedules", excursion_id))
        .insert_header(state.bearer(10, UserRole::Resident))
        .set_json(&schedule)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let schedule_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["published"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"]["count_of_repeats"], 4);
    assert_eq!(body["message"], "4 sessions published");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/excursions/{}", excursion_id))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 5);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/excursions/{}/schedules", excursion_id))
        .insert_header(state.bearer(10, UserRole::Resident))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/v1/excursions/{}/schedules/{}",
            excursion_id, schedule_id
        ))
        .insert_header(state.bearer(10, UserRole::Resident))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/housekeeping/publish-schedules")
        .insert_header(state.bearer(1, UserRole::Admin))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["schedules"], 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/excursions/{}", excursion_id))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 5);
}

#[actix_rt::test]
async fn test_admin_reservation_list_and_detail() {
    let state = TestState::new();
    let session = state.session(10, 8, dec!(1500)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/sessions/{}/reservations", session.id))
        .insert_header(state.bearer(20, UserRole::User))
        .set_json(booking("Anna Petrova", 2))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["reservation"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/v1/admin/reservations")
        .insert_header(state.bearer(10, UserRole::Resident))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/admin/reservations?session_id={}", session.id))
        .insert_header(state.bearer(1, UserRole::Admin))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id);
    assert_eq!(list[0]["state"], "pending");

    let req = test::TestRequest::get()
        .uri("/api/v1/admin/reservations?per_page=0")
        .insert_header(state.bearer(1, UserRole::Admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/admin/reservations/{}", id))
        .insert_header(state.bearer(1, UserRole::Admin))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["reservation"]["full_name"], "Anna Petrova");
    assert_eq!(body["data"]["session"]["id"], session.id);
    assert_eq!(body["data"]["excursion"]["id"], session.excursion_id);
    assert_eq!(body["data"]["payment"]["gateway_payment_id"], "pay-1");
    assert_eq!(body["data"]["payment"]["status"], "created");

    let req = test::TestRequest::get()
        .uri("/api/v1/admin/reservations/9999")
        .insert_header(state.bearer(1, UserRole::Admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
