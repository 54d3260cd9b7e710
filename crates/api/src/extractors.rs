//! Request extractors.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use engine_core::GeoInfo;

/// Client IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // First hop of X-Forwarded-For wins over X-Real-IP
        if let Some(ip) = header_str(&parts.headers, "X-Forwarded-For")
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return Ok(ClientIp(Some(ip.to_string())));
        }

        Ok(ClientIp(
            header_str(&parts.headers, "X-Real-IP").map(|ip| ip.trim().to_string()),
        ))
    }
}

/// Raw `User-Agent` header.
#[derive(Debug, Clone)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(UserAgent(
            parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .filter(|ua| !ua.is_empty())
                .map(str::to_string),
        ))
    }
}

/// Geo hints set by the edge in front of the service.
#[derive(Debug, Clone, Default)]
pub struct GeoHints(pub GeoInfo);

#[async_trait]
impl<S> FromRequestParts<S> for GeoHints
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(GeoHints(geo_from_headers(&parts.headers)))
    }
}

/// Explicit `X-Geo-*` headers first, then Vercel, then Cloudflare.
pub fn geo_from_headers(headers: &HeaderMap) -> GeoInfo {
    let mut geo = GeoInfo {
        country: text(headers, "X-Geo-Country"),
        city: text(headers, "X-Geo-City"),
        region: text(headers, "X-Geo-Region"),
        lat: number(headers, "X-Geo-Lat"),
        lng: number(headers, "X-Geo-Lng"),
    };

    geo.merge(&GeoInfo {
        country: text(headers, "X-Vercel-IP-Country"),
        city: text(headers, "X-Vercel-IP-City"),
        region: text(headers, "X-Vercel-IP-Country-Region"),
        lat: number(headers, "X-Vercel-IP-Latitude"),
        lng: number(headers, "X-Vercel-IP-Longitude"),
    });

    geo.merge(&GeoInfo {
        country: text(headers, "CF-IPCountry").filter(|c| c != "XX" && c != "T1"),
        ..Default::default()
    });

    geo.sanitized()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Header value, percent-decoded (Vercel encodes city names).
fn text(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = header_str(headers, name)?.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains('%') {
        return Some(raw.to_string());
    }
    let decoded: String = url::form_urlencoded::parse(raw.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_else(|| raw.to_string());
    Some(decoded)
}

fn number(headers: &HeaderMap, name: &str) -> Option<f64> {
    header_str(headers, name)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
