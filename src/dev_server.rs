//! Wiring the artifact directory and the viewer page into the dev server.
//!
//! The host keeps a [`RouteTable`] and a list of before-middlewares; [`DevServerIntegration`]
//! adds one static middleware for published artifacts and one viewer route, and only when
//! the environment is development. [`DevHost::into_router`] turns the result into an axum
//! [`Router`].

use crate::artifact::{ArtifactStore, ARTIFACT_FILE_PREFIX};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::viewer::{VIEWER_FILE, VIEWER_ROUTE_ID, VIEWER_ROUTE_PATH};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// A page route backed by a generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub id: String,
    pub path: String,
    pub file: PathBuf,
}

/// Page routes of the host, keyed by route id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: BTreeMap<String, RouteEntry>,
}

impl RouteTable {
    pub fn insert(&mut self, entry: RouteEntry) -> Option<RouteEntry> {
        self.routes.insert(entry.id.clone(), entry)
    }

    pub fn get(&self, id: &str) -> Option<&RouteEntry> {
        self.routes.get(id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values()
    }
}

/// Serves `GET /umi-plugins_<name>.json` from a directory and passes everything else on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticArtifacts {
    root: PathBuf,
}

impl StaticArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches(request: &Request) -> bool {
        if request.method() != Method::GET && request.method() != Method::HEAD {
            return false;
        }
        request
            .uri()
            .path()
            .strip_prefix('/')
            .is_some_and(|file| {
                file.starts_with(ARTIFACT_FILE_PREFIX) && file.ends_with(".json") && !file.contains('/')
            })
    }
}

async fn serve_artifacts(
    State(artifacts): State<StaticArtifacts>,
    request: Request,
    next: Next,
) -> Response {
    if !StaticArtifacts::matches(&request) {
        return next.run(request).await;
    }

    debug!("Serving artifact {}", request.uri().path());
    match ServeDir::new(&artifacts.root).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// The parts of the dev server that integrations may extend.
#[derive(Debug, Clone, Default)]
pub struct DevHost {
    pub routes: RouteTable,
    pub before_middlewares: Vec<StaticArtifacts>,
}

impl DevHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the router: `app`, plus one GET route per page route, with the
    /// before-middlewares wrapped around all of it. The first before-middleware is the
    /// outermost layer and sees each request first.
    pub fn into_router(self, app: Router) -> Router {
        let mut router = app;
        for entry in self.routes.iter() {
            let file = entry.file.clone();
            router = router.route(
                &entry.path,
                get(move || {
                    let file = file.clone();
                    async move { serve_page(&file).await }
                }),
            );
        }

        // Each layer wraps the previous ones, so apply the list back to front.
        for artifacts in self.before_middlewares.into_iter().rev() {
            router = router.layer(middleware::from_fn_with_state(artifacts, serve_artifacts));
        }
        router
    }
}

async fn serve_page(file: &Path) -> std::result::Result<Html<String>, (StatusCode, String)> {
    tokio::fs::read_to_string(file).await.map(Html).map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            format!("page {} is not generated yet: {}", file.display(), e),
        )
    })
}

/// Registers the static artifact middleware and the viewer route in development.
#[derive(Debug, Clone)]
pub struct DevServerIntegration {
    environment: Environment,
    store: ArtifactStore,
    tmp_dir: PathBuf,
}

impl DevServerIntegration {
    pub fn new(environment: Environment, store: ArtifactStore, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            environment,
            store,
            tmp_dir: tmp_dir.into(),
        }
    }

    /// The static artifact middleware, or nothing outside development.
    pub fn middlewares(&self) -> Vec<StaticArtifacts> {
        if !self.environment.is_development() {
            return Vec::new();
        }
        vec![StaticArtifacts::new(self.store.root_path())]
    }

    /// Adds the viewer route to `routes`; a no-op outside development.
    pub fn register_viewer_route(&self, routes: &mut RouteTable) {
        if !self.environment.is_development() {
            return;
        }
        routes.insert(RouteEntry {
            id: VIEWER_ROUTE_ID.to_string(),
            path: VIEWER_ROUTE_PATH.to_string(),
            file: self.tmp_dir.join(VIEWER_FILE),
        });
    }

    /// Applies both registrations to `host`.
    pub fn activate(&self, host: &mut DevHost) {
        // Before-middlewares run ahead of the host's own chain.
        let mut middlewares = self.middlewares();
        middlewares.append(&mut host.before_middlewares);
        host.before_middlewares = middlewares;
        self.register_viewer_route(&mut host.routes);
    }
}

/// Serves `router` on `listener` until the server stops.
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| Error::Server(e.to_string()))?;
    info!("Dev server listening on http://{}", addr);
    info!("API documentation at http://{}{}", addr, VIEWER_ROUTE_PATH);
    axum::serve(listener, router)
        .await
        .map_err(|e| Error::Server(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        store: ArtifactStore,
        tmp_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::in_dependency_cache(&temp_dir.path().join("node_modules"));
        store.reset();
        let tmp_dir = temp_dir.path().join("tmp");
        Fixture {
            _temp_dir: temp_dir,
            store,
            tmp_dir,
        }
    }

    fn app() -> Router {
        Router::new().route("/hello", get(|| async { "hello from the app" }))
    }

    async fn get_path(router: Router, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[test]
    fn test_production_leaves_host_unchanged() {
        let f = fixture();
        let integration = DevServerIntegration::new(Environment::Production, f.store.clone(), &f.tmp_dir);
        let mut host = DevHost::new();
        let before = host.routes.clone();

        integration.activate(&mut host);

        assert_eq!(host.routes, before);
        assert!(host.before_middlewares.is_empty());
    }

    #[test]
    fn test_development_registers_one_route_and_middleware() {
        let f = fixture();
        let integration = DevServerIntegration::new(Environment::Development, f.store.clone(), &f.tmp_dir);
        let mut host = DevHost::new();
        host.before_middlewares.push(StaticArtifacts::new("/elsewhere"));

        integration.activate(&mut host);

        assert_eq!(host.routes.len(), 1);
        let route = host.routes.get(VIEWER_ROUTE_ID).unwrap();
        assert_eq!(route.path, "/umi/plugin/openapi");
        assert_eq!(route.file, f.tmp_dir.join("plugin-openapi/openapi.html"));
        assert_eq!(host.before_middlewares.len(), 2);
        assert_eq!(host.before_middlewares[0].root(), f.store.root_path());
    }

    #[tokio::test]
    async fn test_published_artifact_is_served() {
        let f = fixture();
        f.store.publish_bytes("pets", b"{\"openapi\": \"3.0.0\"}").unwrap();
        let integration = DevServerIntegration::new(Environment::Development, f.store.clone(), &f.tmp_dir);
        let mut host = DevHost::new();
        integration.activate(&mut host);
        let router = host.into_router(app());

        let (status, body) = get_path(router.clone(), "/umi-plugins_pets.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{\"openapi\": \"3.0.0\"}");

        let (status, _) = get_path(router.clone(), "/umi-plugins_never.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_path(router, "/hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello from the app");
    }

    #[tokio::test]
    async fn test_viewer_route_serves_current_page() {
        let f = fixture();
        let integration = DevServerIntegration::new(Environment::Development, f.store.clone(), &f.tmp_dir);
        let mut host = DevHost::new();
        integration.activate(&mut host);
        let router = host.into_router(app());

        let (status, _) = get_path(router.clone(), VIEWER_ROUTE_PATH).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let page = f.tmp_dir.join(VIEWER_FILE);
        std::fs::create_dir_all(page.parent().unwrap()).unwrap();
        std::fs::write(&page, "<html>first</html>").unwrap();
        let (status, body) = get_path(router.clone(), VIEWER_ROUTE_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html>first</html>");

        std::fs::write(&page, "<html>second</html>").unwrap();
        let (_, body) = get_path(router, VIEWER_ROUTE_PATH).await;
        assert_eq!(body, "<html>second</html>");
    }

    #[tokio::test]
    async fn test_production_router_has_no_dev_endpoints() {
        let f = fixture();
        f.store.publish_bytes("pets", b"{}").unwrap();
        let integration = DevServerIntegration::new(Environment::Production, f.store.clone(), &f.tmp_dir);
        let mut host = DevHost::new();
        integration.activate(&mut host);
        let router = host.into_router(app());

        let (status, _) = get_path(router.clone(), "/umi-plugins_pets.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_path(router, VIEWER_ROUTE_PATH).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_first_before_middleware_runs_first() {
        let f = fixture();
        f.store.publish_bytes("pets", b"from the artifact store").unwrap();
        let host_dir = TempDir::new().unwrap();
        std::fs::write(host_dir.path().join("umi-plugins_pets.json"), "from the host").unwrap();

        let mut host = DevHost::new();
        host.before_middlewares.push(StaticArtifacts::new(host_dir.path()));
        DevServerIntegration::new(Environment::Development, f.store.clone(), &f.tmp_dir)
            .activate(&mut host);
        let router = host.into_router(app());

        let (status, body) = get_path(router, "/umi-plugins_pets.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "from the artifact store");
    }

    #[tokio::test]
    async fn test_non_get_requests_pass_through() {
        let f = fixture();
        f.store.publish_bytes("pets", b"{}").unwrap();
        let router = DevHost {
            routes: RouteTable::default(),
            before_middlewares: vec![StaticArtifacts::new(f.store.root_path())],
        }
        .into_router(app());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/umi-plugins_pets.json")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
