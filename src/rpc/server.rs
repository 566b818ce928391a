use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::FutureExt;
use std::any::Any;
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::rpc::exchange::{abort_call, CallKind, Exchange};
use crate::rpc::handlers::Handler;
use crate::utils::errors::defect_response;
use crate::utils::ErrorKind;

/// Route table plus the shared, read-only configuration of one server.
///
/// Register every path before serving; the table is not modified afterwards.
pub struct Api {
    config: Arc<ApiConfig>,
    router: Router,
}

impl Api {
    pub fn new(config: ApiConfig) -> Self {
        Self { config: Arc::new(config), router: Router::new() }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Bind `handler` to `path`. GET calls carry the message in the query,
    /// POST calls in the body; other methods get 405.
    ///
    /// Panics if `path` is already bound.
    pub fn bind<H: Handler>(mut self, path: &str, handler: H) -> Self {
        let handler = Arc::new(handler);

        let (config, h) = (self.config.clone(), handler.clone());
        let read = move |req: Request| dispatch(config.clone(), h.clone(), CallKind::Read, req);

        let (config, h) = (self.config.clone(), handler);
        let write = move |req: Request| dispatch(config.clone(), h.clone(), CallKind::Write, req);

        self.router = self.router.route(path, get(read).post(write));
        self
    }

    pub fn into_router(self) -> Router {
        self.router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!("Starting JSON API server on {}", addr);
        }
        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Run one call. Exactly one body comes out: the handler's value, the abort
/// body, or the opaque defect body.
async fn dispatch<H: Handler>(
    config: Arc<ApiConfig>,
    handler: Arc<H>,
    kind: CallKind,
    req: Request,
) -> Response {
    let ex = Exchange::new(config.clone(), kind, req);
    let call = ex.call().clone();
    config.logger.debug(&call);

    let outcome = AssertUnwindSafe(async {
        let value = handler.serve_json(ex).await?;
        serde_json::to_vec(&value).map_err(|e| {
            let cause: &(dyn Error + 'static) = &e;
            abort_call(&config, &call, ErrorKind::Encode, "JSON marshal failed", Some(cause))
        })
    })
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok(body)) => ([(CONTENT_TYPE, "application/json")], body).into_response(),
        // already logged by the exchange
        Ok(Err(abort)) => abort.into_response(),
        Err(defect) => {
            config.logger.panic(&call, &panic_message(defect.as_ref()));
            defect_response()
        }
    }
}

fn panic_message(defect: &(dyn Any + Send)) -> String {
    if let Some(s) = defect.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = defect.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
