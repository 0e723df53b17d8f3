//! HTTP booking service tests against a mock server

#![allow(clippy::unwrap_used)]

use booking_client::{
    BookingId, BookingRequest, BookingService, BookingStatus, ClientConfig, ClientInfo,
    HttpBookingService, PaymentMethod, ServiceError, ServiceId, TimeSlotId,
};
use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_for(server: &MockServer) -> HttpBookingService {
    HttpBookingService::new(
        ClientConfig::new(format!("{}/api", server.uri()))
            .with_request_timeout(Duration::from_millis(500)),
    )
    .unwrap()
}

fn may_15() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 5, 15).unwrap()
}

#[tokio::test]
async fn fetches_services() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "service-1",
                "name": "Massage Therapy",
                "description": "60 minute full body massage",
                "price": 8500,
                "durationMinutes": 60
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let services = service_for(&server).get_available_services().await.unwrap();

    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id, ServiceId::new("service-1"));
    assert_eq!(services[0].price.to_string(), "$85.00");
}

#[tokio::test]
async fn fetches_time_slots_for_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services/service-1/dates/2023-05-15/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "slot-1", "startTime": "10:00", "endTime": "11:00", "isAvailable": true },
            { "id": "slot-2", "startTime": "11:00", "endTime": "12:00", "isAvailable": false }
        ])))
        .mount(&server)
        .await;

    let slots = service_for(&server)
        .get_available_time_slots(ServiceId::new("service-1"), may_15())
        .await
        .unwrap();

    assert_eq!(slots.len(), 2);
    assert!(slots[0].is_available);
    assert!(!slots[1].is_available);
}

#[tokio::test]
async fn sends_bearer_token_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services/service-1/dates"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["2023-05-15"])))
        .expect(1)
        .mount(&server)
        .await;

    let service = HttpBookingService::new(
        ClientConfig::new(format!("{}/api", server.uri())).with_api_key("secret"),
    )
    .unwrap();

    let dates = service
        .get_available_dates(ServiceId::new("service-1"))
        .await
        .unwrap();
    assert_eq!(dates[0].date, may_15());
    assert!(dates[0].has_availability);
}

#[tokio::test]
async fn submits_booking_as_camel_case_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bookings"))
        .and(body_partial_json(json!({
            "serviceId": "service-1",
            "date": "2023-05-15",
            "timeSlotId": "slot-1",
            "paymentMethod": "pay_at_appointment",
            "client": { "fullName": "John Doe", "termsAccepted": true }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "booking-123",
            "status": "confirmed",
            "confirmationCode": "ABC123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let confirmation = service_for(&server)
        .submit_booking(BookingRequest {
            service_id: ServiceId::new("service-1"),
            date: may_15(),
            time_slot_id: TimeSlotId::new("slot-1"),
            client: ClientInfo {
                full_name: "John Doe".to_string(),
                email: "john.doe@example.com".to_string(),
                phone: "555-123-4567".to_string(),
                terms_accepted: true,
            },
            payment_method: PaymentMethod::PayAtAppointment,
            payment_intent_id: None,
        })
        .await
        .unwrap();

    assert_eq!(confirmation.id, BookingId::new("booking-123"));
    assert_eq!(confirmation.status, BookingStatus::Confirmed);
    assert_eq!(confirmation.confirmation_code, "ABC123");
}

#[tokio::test]
async fn client_errors_are_rejections_with_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bookings/booking-123/cancel"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({ "message": "Booking already cancelled" })),
        )
        .mount(&server)
        .await;

    let error = service_for(&server)
        .cancel_booking(BookingId::new("booking-123"))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ServiceError::Rejected("Booking already cancelled".to_string())
    );
    assert!(!error.is_transient());
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let error = service_for(&server).get_available_services().await.unwrap_err();

    assert_eq!(
        error,
        ServiceError::Server {
            status: 503,
            message: "maintenance".to_string()
        }
    );
    assert!(error.is_transient());
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let error = service_for(&server).get_available_services().await.unwrap_err();

    assert_eq!(error, ServiceError::Timeout);
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let error = service_for(&server).get_available_services().await.unwrap_err();

    assert!(matches!(error, ServiceError::Decode(_)));
}

#[tokio::test]
async fn ids_are_percent_encoded_as_single_path_segments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/services/studio%2F7%3Fx/dates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["2023-05-15"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/bookings/BK%231/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "BK#1",
            "status": "cancelled",
            "confirmationCode": "ABC123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let dates = service
        .get_available_dates(ServiceId::new("studio/7?x"))
        .await
        .unwrap();
    let cancelled = service.cancel_booking(BookingId::new("BK#1")).await.unwrap();

    assert_eq!(dates.len(), 1);
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

#[test]
fn base_url_without_a_path_is_rejected() {
    let error = HttpBookingService::new(ClientConfig::new("mailto:bookings@example.com")).unwrap_err();

    assert!(matches!(error, ServiceError::InvalidUrl(_)));
}
