use crate::binding::model::{to_json_object, BoundParams};
use crate::http::{HttpRequest, ReqParam};
use crate::interface::model::{ApiInterface, BodyKind, ParamKind};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use tracing::debug;
use url::form_urlencoded;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid interface url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Turns bound parameters into a concrete outbound request.
///
/// Query parameters are appended to whatever query the interface URL already carries.
/// Caller headers that share a name with a declared header parameter are dropped, since
/// the binder has already decided that value (and a locked one must not be overridden).
/// Undeclared caller headers are passed through as given.
pub fn build_request(
    interface: &ApiInterface,
    bound: &BoundParams,
    header_overrides: &HashMap<String, String>,
) -> Result<HttpRequest, RequestError> {
    let raw_url = interface.url.trim();
    let mut url = Url::parse(raw_url).map_err(|err| RequestError::InvalidUrl {
        url: raw_url.to_string(),
        reason: err.to_string(),
    })?;
    if !bound.url.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &bound.url {
            pairs.append_pair(name, &value.to_text());
        }
    }

    let mut headers: Vec<ReqParam> = bound
        .headers
        .iter()
        .map(|(name, value)| ReqParam::new(name.clone(), value.to_text()))
        .collect();
    let mut passthrough: Vec<(&String, &String)> = header_overrides
        .iter()
        .filter(|(name, _)| interface.find_param(ParamKind::HeaderParam, name).is_none())
        .collect();
    passthrough.sort();
    for (name, value) in passthrough {
        headers.push(ReqParam::new(name.clone(), value.clone()));
    }

    let body = if bound.body.is_empty() {
        None
    } else if !interface.method.is_body_bearing() {
        debug!(
            "{} does not carry a body, dropping {} body parameters",
            interface.method,
            bound.body.len()
        );
        None
    } else {
        let body_kind = interface.body_kind_or_default();
        if !headers.iter().any(|header| header.key.eq_ignore_ascii_case(CONTENT_TYPE.as_str())) {
            headers.push(ReqParam::new(
                CONTENT_TYPE.as_str().to_string(),
                body_kind.content_type().to_string(),
            ));
        }
        Some(encode_body(body_kind, bound))
    };

    for header in &headers {
        validate_header(header)?;
    }

    Ok(HttpRequest {
        method: interface.method,
        url: url.to_string(),
        headers,
        body,
    })
}

fn encode_body(body_kind: BodyKind, bound: &BoundParams) -> String {
    match body_kind {
        BodyKind::Json => to_json_object(&bound.body).to_string(),
        BodyKind::FormUrlEncoded => form_urlencoded::Serializer::new(String::new())
            .extend_pairs(bound.body.iter().map(|(name, value)| (name.as_str(), value.to_text())))
            .finish(),
    }
}

fn validate_header(header: &ReqParam) -> Result<(), RequestError> {
    HeaderName::from_bytes(header.key.as_bytes()).map_err(|err| RequestError::InvalidHeader {
        name: header.key.clone(),
        reason: err.to_string(),
    })?;
    HeaderValue::from_str(&header.value).map_err(|err| RequestError::InvalidHeader {
        name: header.key.clone(),
        reason: err.to_string(),
    })?;
    Ok(())
}
