// src/services/rate_limit.rs
// DOCUMENTATION: Per-IP request throttling for the JSON API
// PURPOSE: One keyed governor limiter shared by every worker

use crate::errors::AppError;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, ResponseError};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::sync::Arc;

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

#[derive(Clone)]
pub struct ApiRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl ApiRateLimiter {
    /// `max` requests per IP per hour (at least one)
    pub fn per_hour(max: u32) -> Self {
        let max = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_hour(max))),
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), AppError> {
        self.limiter.check_key(&ip).map_err(|_| {
            log::warn!("Rate limit exceeded for {}", ip);
            AppError::RateLimitExceeded
        })
    }
}

fn client_ip(req: &ServiceRequest) -> IpAddr {
    req.connection_info()
        .realip_remote_addr()
        .and_then(|addr| {
            addr.parse::<IpAddr>()
                .ok()
                .or_else(|| addr.parse::<std::net::SocketAddr>().ok().map(|s| s.ip()))
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware for the /api scope; answers 429 without calling the handler
pub async fn limit_requests(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, Error> {
    let verdict = match req.app_data::<web::Data<ApiRateLimiter>>() {
        Some(limiter) => limiter.check(client_ip(&req)),
        None => Ok(()),
    };

    if let Err(e) = verdict {
        let response = e.error_response();
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_per_ip() {
        let limiter = ApiRateLimiter::per_hour(2);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_ok());
        assert!(matches!(limiter.check(a), Err(AppError::RateLimitExceeded)));
        assert!(limiter.check(b).is_ok());
    }

    #[test]
    fn test_zero_max_still_allows_one() {
        let limiter = ApiRateLimiter::per_hour(0);
        let ip: IpAddr = "10.0.0.3".parse().unwrap();
        assert!(limiter.check(ip).is_ok());
        assert!(limiter.check(ip).is_err());
    }
}
