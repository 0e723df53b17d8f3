//! REST implementation of [`BookingService`] over `reqwest`.

use crate::config::ClientConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::service::BookingService;
use crate::types::{
    BookingConfirmation, BookingId, BookingRequest, DateAvailability, PaymentIntent,
    PaymentIntentRequest, Service, ServiceId, TimeSlot, TimeSlotId,
};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Booking service reached over HTTP
#[derive(Clone, Debug)]
pub struct HttpBookingService {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleBody {
    date: NaiveDate,
    time_slot_id: TimeSlotId,
}

impl HttpBookingService {
    /// Create a service client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidUrl`] if the base URL does not parse
    /// or cannot hold a path, and [`ServiceError::Network`] if the HTTP
    /// client cannot be built (TLS backend initialization failure).
    pub fn new(config: ClientConfig) -> ServiceResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(config.base_url));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    /// Create a service client from environment variables
    ///
    /// # Errors
    ///
    /// See [`HttpBookingService::new`].
    pub fn from_env() -> ServiceResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Base URL extended by `segments`, each percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn get<T>(
        &self,
        operation: &'static str,
        segments: &[&str],
    ) -> BoxFuture<'static, ServiceResult<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = self.authorize(self.client.get(self.url(segments)));
        Box::pin(execute(operation, request))
    }

    fn post<B, T>(
        &self,
        operation: &'static str,
        segments: &[&str],
        body: Option<&B>,
    ) -> BoxFuture<'static, ServiceResult<T>>
    where
        B: serde::Serialize,
        T: DeserializeOwned + Send + 'static,
    {
        let mut request = self.authorize(self.client.post(self.url(segments)));
        if let Some(body) = body {
            request = request.json(body);
        }
        Box::pin(execute(operation, request))
    }
}

/// Send a request and map the response onto [`ServiceError`]
async fn execute<T>(operation: &'static str, request: RequestBuilder) -> ServiceResult<T>
where
    T: DeserializeOwned,
{
    tracing::debug!(operation, "Calling booking service");

    let response = request.send().await.map_err(|e| {
        let error = ServiceError::from(e);
        tracing::warn!(operation, error = %error, "Booking service request failed");
        error
    })?;

    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body
            }
        });

    tracing::warn!(operation, status = status.as_u16(), %message, "Booking service returned an error");

    if status.is_server_error() {
        Err(ServiceError::Server {
            status: status.as_u16(),
            message,
        })
    } else if status == StatusCode::REQUEST_TIMEOUT {
        Err(ServiceError::Timeout)
    } else {
        Err(ServiceError::Rejected(message))
    }
}

impl BookingService for HttpBookingService {
    fn get_available_services(&self) -> BoxFuture<'static, ServiceResult<Vec<Service>>> {
        self.get("get_available_services", &["services"])
    }

    fn get_available_dates(
        &self,
        service_id: ServiceId,
    ) -> BoxFuture<'static, ServiceResult<Vec<DateAvailability>>> {
        self.get(
            "get_available_dates",
            &["services", service_id.as_str(), "dates"],
        )
    }

    fn get_available_time_slots(
        &self,
        service_id: ServiceId,
        date: NaiveDate,
    ) -> BoxFuture<'static, ServiceResult<Vec<TimeSlot>>> {
        let date = date.to_string();
        self.get(
            "get_available_time_slots",
            &["services", service_id.as_str(), "dates", date.as_str(), "slots"],
        )
    }

    fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> BoxFuture<'static, ServiceResult<PaymentIntent>> {
        self.post("create_payment_intent", &["payments", "intents"], Some(&request))
    }

    fn submit_booking(
        &self,
        request: BookingRequest,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>> {
        self.post("submit_booking", &["bookings"], Some(&request))
    }

    fn cancel_booking(
        &self,
        booking_id: BookingId,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>> {
        self.post::<(), _>(
            "cancel_booking",
            &["bookings", booking_id.as_str(), "cancel"],
            None,
        )
    }

    fn reschedule_booking(
        &self,
        booking_id: BookingId,
        date: NaiveDate,
        time_slot_id: TimeSlotId,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>> {
        self.post(
            "reschedule_booking",
            &["bookings", booking_id.as_str(), "reschedule"],
            Some(&RescheduleBody { date, time_slot_id }),
        )
    }
}
