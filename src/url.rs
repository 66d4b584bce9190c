//! Destructure DID URLs into strongly typed components.
//!
//! A DID URL is of the form
//!
//! `did:<method>:<method-specific-id>[/<path>][?<query>][#<fragment>]`.

use std::fmt::{Display, Formatter, Write as _};
use std::str::FromStr;

use nom::bytes::complete::{is_not, tag, take, take_until};
use nom::combinator::{opt, rest};
use nom::error::{Error as NomError, ErrorKind};
use nom::sequence::{preceded, terminated};
use nom::{Err as NomErr, IResult, Parser};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// DID methods understood by this crate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `did:key` — used by witnesses and proof verification methods.
    #[default]
    Key,

    /// `did:webvh`
    WebVh,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(Self::Key),
            "webvh" => Ok(Self::WebVh),
            _ => Err(Error::Format(format!("method not supported: {s}"))),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::WebVh => write!(f, "webvh"),
        }
    }
}

/// Structure of a DID URL.
#[derive(Clone, Debug, Default)]
pub struct Url {
    /// DID method.
    pub method: Method,

    /// Method-specific ID.
    ///
    /// For `did:webvh` this is the SCID and the colon-separated host and
    /// path; any port is percent-encoded (`%3A`).
    pub id: String,

    /// Path, if present. Identical to a generic URI path.
    pub path: Option<Vec<String>>,

    /// Query parameters refining resolution, if present.
    pub query: Option<QueryParams>,

    /// Fragment identifying a resource inside the DID document, typically a
    /// verification method or service.
    pub fragment: Option<String>,
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)?;
        if let Some(path) = &self.path {
            write!(f, "/{}", path.join("/"))?;
        }
        if let Some(query) = &self.query {
            write!(f, "?")?;
            let mut first = true;
            if let Some(version_id) = &query.version_id {
                write!(f, "versionId={version_id}")?;
                first = false;
            }
            if let Some(version_time) = &query.version_time {
                if !first {
                    write!(f, "&")?;
                }
                write!(f, "versionTime={version_time}")?;
                first = false;
            }
            if let Some(service) = &query.service {
                if !first {
                    write!(f, "&")?;
                }
                write!(f, "service={service}")?;
            }
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_url(s) {
            Ok((_, url)) => Ok(url),
            Err(err) => Err(Error::Format(format!("failed to parse DID URL: {err}"))),
        }
    }
}

impl Url {
    /// The internal resource identifier for the URL, in the form
    /// `did:<method>:<method-specific-id>#<fragment>`.
    ///
    /// Note this is unreliable as an ID if there is no fragment on the URL.
    #[must_use]
    pub fn resource_id(&self) -> String {
        let mut id = format!("did:{}:{}", self.method, self.id);
        if let Some(fragment) = &self.fragment {
            let _ = write!(id, "#{fragment}");
        }
        id
    }

    /// The DID part of the URL, excluding path, query, and fragment.
    #[must_use]
    pub fn did(&self) -> String {
        format!("did:{}:{}", self.method, self.id)
    }
}

/// DID parameters carried in the URL query component.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Identifies a service from the DID document by the service's ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Identifies a specific version of the DID document to be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    /// Identifies a version timestamp of the DID document to be resolved —
    /// the document that was valid for the DID at that time. RFC 3339 UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_time: Option<String>,
}

fn scheme(input: &str) -> IResult<&str, &str> {
    terminated(tag("did"), tag(":")).parse(input)
}

fn method(input: &str) -> IResult<&str, Method> {
    let (next, m) = take_until(":").parse(input)?;
    let m =
        Method::from_str(m).map_err(|_| NomErr::Error(NomError::new(m, ErrorKind::TakeUntil)))?;
    let (next, _) = take(1usize).parse(next)?;
    Ok((next, m))
}

fn id(input: &str) -> IResult<&str, &str> {
    is_not("%/?#").parse(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    let (next, p) = preceded(tag("%3A"), is_not("/?#")).parse(input)?;
    let p = p.parse::<u16>().map_err(|_| NomErr::Error(NomError::new(p, ErrorKind::IsNot)))?;
    Ok((next, p))
}

fn path(input: &str) -> IResult<&str, Vec<String>> {
    let (next, p) = preceded(tag("/"), is_not("?#")).parse(input)?;
    Ok((next, p.split('/').map(ToString::to_string).collect()))
}

fn query(input: &str) -> IResult<&str, QueryParams> {
    let (next, q) = preceded(tag("?"), is_not("#")).parse(input)?;
    let mut params = QueryParams::default();
    for param in q.split('&') {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        match key {
            "service" => params.service = Some(value.to_string()),
            "versionId" => params.version_id = Some(value.to_string()),
            "versionTime" => params.version_time = Some(value.to_string()),
            _ => {}
        }
    }
    Ok((next, params))
}

fn fragment(input: &str) -> IResult<&str, &str> {
    preceded(tag("#"), rest).parse(input)
}

fn parse_url(input: &str) -> IResult<&str, Url> {
    let (next, _scheme) = scheme(input)?;
    let (next, (parsed_method, parsed_id, parsed_port, parsed_path, parsed_query, parsed_fragment)) =
        (method, id, opt(port), opt(path), opt(query), opt(fragment)).parse(next)?;
    let id = parsed_port.map_or_else(|| parsed_id.to_string(), |p| format!("{parsed_id}%3A{p}"));
    Ok((
        next,
        Url {
            method: parsed_method,
            id,
            path: parsed_path,
            query: parsed_query,
            fragment: parsed_fragment.map(str::to_string),
        },
    ))
}
