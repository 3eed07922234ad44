use async_trait::async_trait;
use reqwest::{Request, Response};

/// The single outbound seam every data source goes through.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
