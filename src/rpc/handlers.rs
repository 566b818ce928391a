use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;

use crate::rpc::exchange::Exchange;
use crate::utils::Abort;

/// A JSON endpoint. Returning `Err` ends the call with the abort's error body;
/// returning `Ok` serializes the value as the response body.
///
/// Implemented for any `Fn(Exchange) -> impl Future<Output = Result<T, Abort>>`.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Output: Serialize + Send + 'static;

    async fn serve_json(&self, ex: Exchange) -> Result<Self::Output, Abort>;
}

#[async_trait]
impl<F, Fut, T> Handler for F
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Abort>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    type Output = T;

    async fn serve_json(&self, ex: Exchange) -> Result<T, Abort> {
        (self)(ex).await
    }
}
