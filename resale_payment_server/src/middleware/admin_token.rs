//! Admin token middleware for Actix Web.
//!
//! Administrative routes are protected by a shared token, configured with `RPG_ADMIN_TOKEN` and supplied by callers
//! in the `x-admin-token` header. If no token is configured, every call is refused.
//!
//! The supplied token is never compared with the configured one directly. Both are run through HMAC-SHA256 and the
//! digests are compared in constant time, so the comparison does not leak how much of the token was right.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use log::{trace, warn};
use rpg_common::Secret;
use sha2::Sha256;

use crate::errors::{AuthError, ServerError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
const TOKEN_DOMAIN: &[u8] = b"rpg-admin-token";

fn token_digest(token: &str) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(token.as_bytes()).ok()?;
    mac.update(TOKEN_DOMAIN);
    Some(mac)
}

pub struct AdminTokenMiddlewareFactory {
    // None when no token is configured
    expected: Option<Rc<Vec<u8>>>,
}

impl AdminTokenMiddlewareFactory {
    pub fn new(token: &Secret<String>) -> Self {
        let expected = if token.is_empty() {
            None
        } else {
            token_digest(token.reveal().trim()).map(|mac| Rc::new(mac.finalize().into_bytes().to_vec()))
        };
        Self { expected }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminTokenMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminTokenMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminTokenMiddlewareService { expected: self.expected.clone(), service: Rc::new(service) }))
    }
}

pub struct AdminTokenMiddlewareService<S> {
    expected: Option<Rc<Vec<u8>>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminTokenMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let expected = self.expected.clone();
        Box::pin(async move {
            trace!("🔐️ Checking admin token for {}", req.path());
            let Some(expected) = expected else {
                warn!("🔐️ Admin call to {} refused. No admin token is configured.", req.path());
                return Err(ServerError::from(AuthError::AdminAccessDisabled).into());
            };
            let supplied = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()).map(str::trim);
            let Some(supplied) = supplied.filter(|s| !s.is_empty()) else {
                warn!("🔐️ Admin call to {} refused. No admin token was supplied.", req.path());
                return Err(ServerError::from(AuthError::MissingAdminToken).into());
            };
            let valid = token_digest(supplied).map(|mac| mac.verify_slice(&expected).is_ok()).unwrap_or(false);
            if valid {
                trace!("🔐️ Admin token check ✅️");
                service.call(req).await
            } else {
                warn!("🔐️ Admin call to {} refused. The admin token is wrong.", req.path());
                Err(ServerError::from(AuthError::InvalidAdminToken).into())
            }
        })
    }
}
