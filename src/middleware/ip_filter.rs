//! Allow-list for the processor callback route, plus client address
//! resolution shared with the checkout handler.

use std::net::{IpAddr, SocketAddr};
use std::task::{Context, Poll};

use axum::extract::connect_info::ConnectInfo;
use axum::http::{Extensions, HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::config::AllowedIps;
use crate::error::AppError;

/// Resolves the caller address, honouring `X-Forwarded-For` up to the
/// configured number of trusted proxies.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientIpResolver {
    trusted_proxy_depth: usize,
}

impl ClientIpResolver {
    pub fn new(trusted_proxy_depth: usize) -> Self {
        Self { trusted_proxy_depth }
    }

    pub fn resolve(&self, headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
        let peer = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        self.resolve_with_peer(headers, peer)
    }

    pub fn resolve_with_peer(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
        self.from_forwarded_for(headers).or(peer)
    }

    fn from_forwarded_for(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
        let hops: Vec<IpAddr> = raw.split(',').filter_map(parse_hop).collect();

        // The rightmost `trusted_proxy_depth` entries were appended by our
        // own proxies; the one before them is the caller.
        if self.trusted_proxy_depth >= hops.len() {
            return None;
        }
        hops.get(hops.len() - 1 - self.trusted_proxy_depth).copied()
    }
}

fn parse_hop(entry: &str) -> Option<IpAddr> {
    let entry = entry.trim();
    entry
        .parse::<IpAddr>()
        .ok()
        .or_else(|| entry.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

pub fn is_allowed(client_ip: Option<IpAddr>, allowed_ips: &AllowedIps) -> bool {
    match (allowed_ips, client_ip) {
        (AllowedIps::Any, _) => true,
        (AllowedIps::Cidrs(cidrs), Some(ip)) => cidrs.iter().any(|cidr| cidr.contains(&ip)),
        (AllowedIps::Cidrs(_), None) => false,
    }
}

#[derive(Clone, Debug)]
pub struct IpFilterLayer {
    allowed_ips: AllowedIps,
    resolver: ClientIpResolver,
}

impl IpFilterLayer {
    pub fn new(allowed_ips: AllowedIps, trusted_proxy_depth: usize) -> Self {
        Self {
            allowed_ips,
            resolver: ClientIpResolver::new(trusted_proxy_depth),
        }
    }
}

impl<S> Layer<S> for IpFilterLayer {
    type Service = IpFilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpFilterService {
            inner,
            allowed_ips: self.allowed_ips.clone(),
            resolver: self.resolver,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IpFilterService<S> {
    inner: S,
    allowed_ips: AllowedIps,
    resolver: ClientIpResolver,
}

impl<S, B> Service<Request<B>> for IpFilterService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = futures_util::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let client_ip = self.resolver.resolve(req.headers(), req.extensions());

        if !is_allowed(client_ip, &self.allowed_ips) {
            tracing::warn!(
                client_ip = ?client_ip,
                path = %req.uri().path(),
                "rejected payment callback from address outside ALLOWED_IPS"
            );
            let response =
                AppError::Forbidden("Callback source not allowed".to_string()).into_response();
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}
