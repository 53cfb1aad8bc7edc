//! Client for an OpenRouteService compatible directions API, used for any
//! tour which can't be planned on the internal path network.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::common::config::{PlannerConfig, RoutingProfile};
use crate::common::tour::{Track, TrackPoint};
use crate::error::RoutingServiceError;

/// Anything which can turn an ordered list of points into a track
pub trait DirectionsService: Send + Sync {
    fn directions(
        &self,
        points: &[TrackPoint],
        profile: RoutingProfile,
    ) -> impl Future<Output = Result<Track, RoutingServiceError>> + Send;
}

// --- Data structures for parsing directions responses ---
#[derive(Deserialize)]
struct DirectionsResponse {
    features: Vec<RouteFeature>,
}
#[derive(Deserialize)]
struct RouteFeature {
    geometry: RouteGeometry,
    properties: RouteProperties,
}
#[derive(Deserialize)]
struct RouteGeometry {
    coordinates: Vec<Vec<f64>>,
}
#[derive(Deserialize)]
struct RouteProperties {
    summary: RouteSummary,
}
// Zero values are left out of the response entirely
#[derive(Deserialize, Default)]
struct RouteSummary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

pub struct ExternalRoutingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ExternalRoutingClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RoutingServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RoutingServiceError::Request(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    pub fn from_config(
        config: &PlannerConfig,
    ) -> Result<Self, RoutingServiceError> {
        Self::new(
            config.routing_url.clone(),
            config.routing_api_key.clone(),
            config.routing_timeout,
        )
    }

    fn classify(&self, err: reqwest::Error) -> RoutingServiceError {
        if err.is_timeout() {
            RoutingServiceError::Timeout(self.timeout)
        } else {
            RoutingServiceError::Request(err.to_string())
        }
    }

    async fn fetch(
        &self,
        points: &[TrackPoint],
        profile: RoutingProfile,
    ) -> Result<Track, RoutingServiceError> {
        if points.len() < 2 {
            return Err(RoutingServiceError::MalformedRequest(format!(
                "at least 2 points are required, got {}",
                points.len()
            )));
        }

        let url =
            format!("{}/v2/directions/{profile}/geojson", self.base_url);
        let coordinates: Vec<[f64; 2]> =
            points.iter().map(|point| [point.lon, point.lat]).collect();
        let body = json!({ "coordinates": coordinates, "elevation": true });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }

        debug!("Requesting directions for {} points from {url}", points.len());
        let response = request.send().await.map_err(|err| self.classify(err))?;
        let status = response.status();
        let text = response.text().await.map_err(|err| self.classify(err))?;

        if !status.is_success() {
            let message = error_message(&text);
            warn!("Routing service returned {status}: {message}");
            return Err(RoutingServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_track(&text)
    }
}

impl DirectionsService for ExternalRoutingClient {
    fn directions(
        &self,
        points: &[TrackPoint],
        profile: RoutingProfile,
    ) -> impl Future<Output = Result<Track, RoutingServiceError>> + Send {
        self.fetch(points, profile)
    }
}

/// Pull the most useful message out of an error body. The service normally
/// responds with {"error": {"code": .., "message": ..}}, but the error may
/// also be a plain string, or the body may not be JSON at all
fn error_message(text: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(text).ok();
    let error = parsed.as_ref().and_then(|body| body.get("error"));

    match error {
        Some(Value::String(message)) => message.clone(),
        Some(detail) => match detail.get("message").and_then(|m| m.as_str()) {
            Some(message) => match detail.get("code").and_then(|c| c.as_u64()) {
                Some(code) => format!("{message} (code {code})"),
                None => message.to_string(),
            },
            None => detail.to_string(),
        },
        None if text.trim().is_empty() => "empty response body".to_string(),
        None => text.trim().to_string(),
    }
}

fn parse_track(text: &str) -> Result<Track, RoutingServiceError> {
    let malformed = RoutingServiceError::MalformedResponse;

    let response: DirectionsResponse = serde_json::from_str(text)
        .map_err(|err| malformed(err.to_string()))?;

    let route = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| malformed("no route in response".to_string()))?;

    let points = route
        .geometry
        .coordinates
        .iter()
        .map(|coord| match coord.as_slice() {
            [lon, lat] => Ok(TrackPoint::new(*lat, *lon, None)),
            [lon, lat, ele, ..] => Ok(TrackPoint::new(*lat, *lon, Some(*ele))),
            _ => Err(malformed(
                "coordinate with fewer than 2 values".to_string(),
            )),
        })
        .collect::<Result<Vec<TrackPoint>, RoutingServiceError>>()?;

    if points.len() < 2 {
        return Err(malformed(format!("route has {} points", points.len())));
    }

    Ok(Track {
        points,
        distance: route.properties.summary.distance,
        duration: route.properties.summary.duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::net::SocketAddr;
    use std::time::Instant;

    const ROUTE_BODY: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"summary": {"distance": 2345.6, "duration": 1800.5}},
            "geometry": {"type": "LineString",
                         "coordinates": [[11.0, 47.0, 600.0],
                                         [11.01, 47.0, 620.5],
                                         [11.02, 47.01, 610.0]]}
        }]
    }"#;

    /// Serve the provided router on a random local port
    async fn spawn_server(router: Router) -> SocketAddr {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn get_client(
        addr: SocketAddr,
        timeout: Duration,
    ) -> ExternalRoutingClient {
        ExternalRoutingClient::new(
            format!("http://{addr}/"),
            Some("test-key".to_string()),
            timeout,
        )
        .unwrap()
    }

    fn get_points() -> Vec<TrackPoint> {
        vec![
            TrackPoint::new(47.0, 11.0, None),
            TrackPoint::new(47.01, 11.02, None),
        ]
    }

    /// Echo the request back as long as it is shaped the way the service
    /// expects, otherwise reject it
    async fn route_handler(
        Path(profile): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        let expected = json!([[11.0, 47.0], [11.02, 47.01]]);
        let coords_ok = body["coordinates"] == expected;
        let auth_ok = headers
            .get("Authorization")
            .is_some_and(|key| key == "test-key");
        if profile == "foot-hiking" && coords_ok && auth_ok {
            (StatusCode::OK, ROUTE_BODY.to_string())
        } else {
            (StatusCode::BAD_REQUEST, format!("unexpected request: {body}"))
        }
    }

    #[tokio::test]
    async fn test_directions_ok() {
        let router = Router::new()
            .route("/v2/directions/{profile}/geojson", post(route_handler));
        let addr = spawn_server(router).await;
        let client = get_client(addr, Duration::from_secs(5));

        let track = client
            .directions(&get_points(), RoutingProfile::FootHiking)
            .await
            .unwrap();

        assert_eq!(track.points.len(), 3);
        assert_eq!(track.points[1], TrackPoint::new(47.0, 11.01, Some(620.5)));
        assert_relative_eq!(track.distance, 2345.6);
        assert_relative_eq!(track.duration, 1800.5);
    }

    /// Structured errors from the service should be passed on with their
    /// status and message
    #[tokio::test]
    async fn test_directions_error_status() {
        let router = Router::new().route(
            "/v2/directions/{profile}/geojson",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": {
                        "code": 2010,
                        "message": "Could not find routable point"
                    }})),
                )
            }),
        );
        let addr = spawn_server(router).await;
        let client = get_client(addr, Duration::from_secs(5));

        let result = client
            .directions(&get_points(), RoutingProfile::FootHiking)
            .await;

        assert_eq!(
            result,
            Err(RoutingServiceError::Status {
                status: 404,
                message: "Could not find routable point (code 2010)".to_string()
            })
        );
    }

    /// A success status with a body that isn't a route must not turn into
    /// an empty track
    #[tokio::test]
    async fn test_directions_malformed_body() {
        let router = Router::new().route(
            "/v2/directions/{profile}/geojson",
            post(|| async {
                Json(json!({"type": "FeatureCollection", "features": []}))
            }),
        );
        let addr = spawn_server(router).await;
        let client = get_client(addr, Duration::from_secs(5));

        let result = client
            .directions(&get_points(), RoutingProfile::FootHiking)
            .await;

        assert!(matches!(
            result,
            Err(RoutingServiceError::MalformedResponse(_))
        ));
    }

    /// A slow service should fail with a timeout close to the configured
    /// bound, rather than hanging
    #[tokio::test]
    async fn test_directions_timeout() {
        let router = Router::new().route(
            "/v2/directions/{profile}/geojson",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                ROUTE_BODY
            }),
        );
        let addr = spawn_server(router).await;
        let timeout = Duration::from_millis(200);
        let client = get_client(addr, timeout);

        let start = Instant::now();
        let result = client
            .directions(&get_points(), RoutingProfile::FootHiking)
            .await;

        assert_eq!(result, Err(RoutingServiceError::Timeout(timeout)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    /// Nothing listening on the port at all
    #[tokio::test]
    async fn test_directions_connection_refused() {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = get_client(addr, Duration::from_secs(5));

        let result = client
            .directions(&get_points(), RoutingProfile::FootHiking)
            .await;

        assert!(matches!(result, Err(RoutingServiceError::Request(_))));
    }

    #[tokio::test]
    async fn test_directions_too_few_points() {
        let timeout = Duration::from_secs(1);
        let client =
            ExternalRoutingClient::new("http://localhost", None, timeout)
                .unwrap();

        let result = client
            .directions(&get_points()[..1], RoutingProfile::FootHiking)
            .await;

        assert!(matches!(
            result,
            Err(RoutingServiceError::MalformedRequest(_))
        ));
    }

    mod test_error_message {
        use super::*;

        #[test]
        fn test_string_error() {
            let body = r#"{"error": "Access denied"}"#;

            assert_eq!(error_message(body), "Access denied");
        }

        #[test]
        fn test_raw_body() {
            assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        }

        #[test]
        fn test_empty_body() {
            assert_eq!(error_message(""), "empty response body");
        }
    }

    #[test]
    fn test_parse_track_missing_summary_values() {
        let body = r#"{"features": [{"properties": {"summary": {}},
            "geometry": {"coordinates": [[1.0, 2.0], [1.0, 2.0]]}}]}"#;

        let track = parse_track(body).unwrap();

        assert_eq!(track.distance, 0.0);
        assert_eq!(track.points.len(), 2);
    }
}
