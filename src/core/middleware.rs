use crate::auth::session::SessionState;
use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};

/// Attaches the signed-in user's ID token to every outgoing request.
///
/// Requests made while signed out go out without credentials and are judged
/// by the database's security rules as unauthenticated.
#[derive(Clone)]
pub struct SessionTokenMiddleware {
    session: SessionState,
}

impl SessionTokenMiddleware {
    pub fn new(session: SessionState) -> Self {
        Self { session }
    }
}

#[async_trait::async_trait]
impl Middleware for SessionTokenMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        if let Some(token) = self.session.id_token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid ID token: {}", e))
            })?;
            req.headers_mut().insert(header::AUTHORIZATION, value);
        }

        next.run(req, extensions).await
    }
}
