//! Read API over the latest metric snapshot.

use std::{collections::BTreeSet, sync::Arc};

use plume_api::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, Router},
    APIHandler, Json, StatusCode,
};
use plume_core::{
    data_model::{
        labels::{ResourceType, LABEL_CONTAINER_NAME, LABEL_NAMESPACE_NAME, LABEL_POD_NAME},
        DescriptorRegistry, MetricSet,
    },
    sources::SnapshotStore,
};
use serde_json::json;

const MAX_LABEL_LENGTH: usize = 63;

/// Rejection for a path segment that cannot name a namespace or pod.
struct InvalidSegment {
    kind: &'static str,
    value: String,
}

impl IntoResponse for InvalidSegment {
    fn into_response(self) -> Response {
        let message = format!("invalid {} name '{}': must be a DNS-1123 label", self.kind, self.value);
        (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
    }
}

// Lowercase alphanumerics and '-', at most 63 characters, starting and ending with an alphanumeric.
fn is_dns1123_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let is_alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LENGTH
                && is_alnum(first)
                && is_alnum(last)
                && bytes.iter().all(|b| is_alnum(b) || *b == b'-')
        }
        _ => false,
    }
}

fn validate(kind: &'static str, value: String) -> Result<String, InvalidSegment> {
    if is_dns1123_label(&value) {
        Ok(value)
    } else {
        Err(InvalidSegment { kind, value })
    }
}

/// State used for the model API handler.
#[derive(Clone)]
pub struct ModelState {
    store: SnapshotStore,
    registry: Arc<DescriptorRegistry>,
}

impl ModelState {
    fn label_values<F>(&self, filter: F, label: &str) -> Vec<String>
    where
        F: Fn(&MetricSet) -> bool,
    {
        let batch = self.store.load();
        batch
            .metric_sets()
            .values()
            .filter(|set| filter(set))
            .filter_map(|set| set.label(label))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// An API handler for browsing the metric model.
///
/// This handler exposes three routes, all answering with a JSON array of names:
///
/// - `/api/v1/model/metrics`: every metric in the descriptor registry
/// - `/api/v1/model/namespaces/{namespace}/pods`: pods with metrics in the namespace
/// - `/api/v1/model/namespaces/{namespace}/pods/{pod}/containers`: containers with metrics in the pod
///
/// Names come from the latest published snapshot. An unknown namespace or pod yields an empty array. A namespace or
/// pod segment that is not a valid DNS-1123 label is rejected with 400 and a JSON `error` field.
pub struct ModelApiHandler {
    state: ModelState,
}

impl ModelApiHandler {
    /// Creates a new `ModelApiHandler` serving from the given store and registry.
    pub fn new(store: SnapshotStore, registry: Arc<DescriptorRegistry>) -> Self {
        Self {
            state: ModelState { store, registry },
        }
    }

    async fn metrics_handler(State(state): State<ModelState>) -> Json<Vec<&'static str>> {
        Json(state.registry.names().collect())
    }

    async fn pods_handler(
        State(state): State<ModelState>, Path(namespace): Path<String>,
    ) -> Result<Json<Vec<String>>, InvalidSegment> {
        let namespace = validate("namespace", namespace)?;

        let pods = state.label_values(
            |set| {
                set.label(LABEL_NAMESPACE_NAME) == Some(namespace.as_str())
                    && matches!(
                        set.resource_type(),
                        Some(ResourceType::Pod) | Some(ResourceType::PodContainer)
                    )
            },
            LABEL_POD_NAME,
        );
        Ok(Json(pods))
    }

    async fn containers_handler(
        State(state): State<ModelState>, Path((namespace, pod)): Path<(String, String)>,
    ) -> Result<Json<Vec<String>>, InvalidSegment> {
        let namespace = validate("namespace", namespace)?;
        let pod = validate("pod", pod)?;

        let containers = state.label_values(
            |set| {
                set.resource_type() == Some(ResourceType::PodContainer)
                    && set.label(LABEL_NAMESPACE_NAME) == Some(namespace.as_str())
                    && set.label(LABEL_POD_NAME) == Some(pod.as_str())
            },
            LABEL_CONTAINER_NAME,
        );
        Ok(Json(containers))
    }
}

impl APIHandler for ModelApiHandler {
    type State = ModelState;

    fn generate_initial_state(&self) -> Self::State {
        self.state.clone()
    }

    fn generate_routes(&self) -> Router<Self::State> {
        Router::new()
            .route("/api/v1/model/metrics", get(Self::metrics_handler))
            .route("/api/v1/model/namespaces/{namespace}/pods", get(Self::pods_handler))
            .route(
                "/api/v1/model/namespaces/{namespace}/pods/{pod}/containers",
                get(Self::containers_handler),
            )
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use chrono::Utc;
    use http_body_util::BodyExt as _;
    use plume_core::data_model::{labels::LABEL_METRIC_SET_TYPE, MetricBatch};
    use serde_json::Value;
    use tower::ServiceExt as _;

    use super::*;

    fn container_set(namespace: &str, pod: &str, container: &str) -> MetricSet {
        let now = Utc::now();
        MetricSet::builder(now, now)
            .with_resource_type(ResourceType::PodContainer)
            .with_label(LABEL_NAMESPACE_NAME, namespace)
            .with_label(LABEL_POD_NAME, pod)
            .with_label(LABEL_CONTAINER_NAME, container)
            .with_metric("memory/usage", 1_i64)
            .build()
            .unwrap()
    }

    fn router() -> Router {
        let now = Utc::now();
        let pod = MetricSet::builder(now, now)
            .with_label(LABEL_METRIC_SET_TYPE, "pod")
            .with_label(LABEL_NAMESPACE_NAME, "default")
            .with_label(LABEL_POD_NAME, "db-0")
            .build()
            .unwrap();
        let store = SnapshotStore::new();
        store.publish(
            MetricBatch::new(now)
                .with_metric_set(
                    "namespace:default/pod:web-0/container:nginx",
                    container_set("default", "web-0", "nginx"),
                )
                .with_metric_set(
                    "namespace:default/pod:web-0/container:sidecar",
                    container_set("default", "web-0", "sidecar"),
                )
                .with_metric_set("namespace:default/pod:db-0", pod)
                .with_metric_set("namespace:other/pod:web-0/container:app", container_set("other", "web-0", "app")),
        );

        let handler = ModelApiHandler::new(store, Arc::new(DescriptorRegistry::standard()));
        handler.generate_routes().with_state(handler.generate_initial_state())
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn lists_containers_of_pod() {
        let (status, body) = get_json("/api/v1/model/namespaces/default/pods/web-0/containers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["nginx", "sidecar"]));
    }

    #[tokio::test]
    async fn lists_pods_of_namespace() {
        let (status, body) = get_json("/api/v1/model/namespaces/default/pods").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["db-0", "web-0"]));
    }

    #[tokio::test]
    async fn unknown_pod_is_empty() {
        let (status, body) = get_json("/api/v1/model/namespaces/default/pods/ghost/containers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = get_json("/api/v1/model/namespaces/nowhere/pods").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn malformed_segment_is_rejected() {
        let (status, body) = get_json("/api/v1/model/namespaces/Default/pods").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("'Default'"));

        let (status, _) = get_json("/api/v1/model/namespaces/default/pods/web_0/containers").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lists_registered_metrics() {
        let (status, body) = get_json("/api/v1/model/metrics").await;
        assert_eq!(status, StatusCode::OK);

        let names = body.as_array().unwrap();
        assert!(names.contains(&json!("cpu/usage")));
        assert!(names.contains(&json!("filesystem/usage")));
    }

    #[test]
    fn dns1123_labels() {
        assert!(is_dns1123_label("kube-system"));
        assert!(is_dns1123_label("a"));
        assert!(!is_dns1123_label(""));
        assert!(!is_dns1123_label("-leading"));
        assert!(!is_dns1123_label("trailing-"));
        assert!(!is_dns1123_label(&"a".repeat(64)));
    }
}
