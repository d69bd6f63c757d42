use super::form::body_fields;
use crate::{
    registry::RepositoryRegistry,
    sync::{FailureKind, SyncOrchestrator, SyncOutcome},
};
use log::{debug, trace, warn};
use tiny_http::Method;

pub const USE_POST: &str = "For security reasons, please use a POST request.";
pub const MISSING_TOKEN: &str = "Missing token parameter.";
pub const INVALID_TOKEN: &str = "Invalid token parameter, please contact the administrator.";
pub const MISSING_SLUG: &str = "Missing slug parameter.";
pub const INVALID_SLUG: &str = "Invalid slug parameter, please contact the administrator.";
pub const OPERATION_COMPLETE: &str = "Operation complete.";
pub const NOT_FOUND: &str = "Not Found";
pub const UNREADABLE_BODY: &str = "Cannot read request body.";
pub const BODY_TOO_LARGE: &str = "Request body is too large.";

/// The response to render, independent of the HTTP server.
#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub html: bool,
}

impl Reply {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Reply {
            status,
            body: body.into(),
            html: false,
        }
    }

    fn html(body: String) -> Self {
        Reply {
            status: 200,
            body,
            html: true,
        }
    }
}

/// Authenticates the requests, resolves the slug and runs the sync.
pub struct RequestHandler {
    homepage: String,
    token: String,
    registry: RepositoryRegistry,
    orchestrator: SyncOrchestrator,
}

impl RequestHandler {
    pub fn new(
        homepage: String,
        token: String,
        registry: RepositoryRegistry,
        orchestrator: SyncOrchestrator,
    ) -> Self {
        RequestHandler {
            homepage,
            token,
            registry,
            orchestrator,
        }
    }

    /// Route the request by its path and method.
    ///
    /// The `url` can contain a urlencoded query string and `body` is the raw request body,
    /// read as a form according to its `content_type`.
    pub fn handle(
        &self,
        method: &Method,
        url: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Reply {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));

        match path {
            "/" => self.index(),
            "/pull" if *method == Method::Post => match body_fields(content_type, body) {
                Ok(fields) => self.pull(&SyncRequest::parse(fields, query)),
                Err(err) => {
                    debug!("Cannot read the form: {err}.");
                    Reply::text(400, UNREADABLE_BODY)
                }
            },
            "/pull" => Reply::text(405, USE_POST),
            _ => Reply::text(404, NOT_FOUND),
        }
    }

    fn index(&self) -> Reply {
        let homepage = &self.homepage;
        Reply::html(format!(
            r#"<a href="{homepage}" target="_blank">{homepage}</a>"#
        ))
    }

    fn pull(&self, request: &SyncRequest) -> Reply {
        let SyncRequest { token, slug } = request;
        if token.is_empty() {
            return Reply::text(401, MISSING_TOKEN);
        }
        if !constant_time_eq(token.as_bytes(), self.token.as_bytes()) {
            warn!("Rejected a pull request with an invalid token.");
            return Reply::text(401, INVALID_TOKEN);
        }

        if slug.is_empty() {
            return Reply::text(400, MISSING_SLUG);
        }
        let Some(entry) = self.registry.lookup(slug) else {
            warn!("Rejected a pull request with unknown slug {slug:?}.");
            return Reply::text(404, INVALID_SLUG);
        };

        match self.orchestrator.sync(entry) {
            SyncOutcome::Success => Reply::text(200, OPERATION_COMPLETE),
            SyncOutcome::Failure { reason, detail } => {
                let status = match reason {
                    FailureKind::BranchMismatch => 409,
                    FailureKind::VerifyFailed | FailureKind::SyncFailed => 500,
                    FailureKind::TimedOut => 504,
                };
                Reply::text(status, format!("Operation failed, error message: {detail}"))
            }
        }
    }
}

/// The fields of a pull request, read from the body and the query string.
#[derive(Debug, Default, PartialEq, Eq)]
struct SyncRequest {
    token: String,
    slug: String,
}

impl SyncRequest {
    /// Read the fields from the body, falling back to the query string.
    /// A missing field is left empty, the first non-empty value of a field wins.
    fn parse(body: Vec<(String, String)>, query: &str) -> Self {
        let mut token: Option<String> = None;
        let mut slug: Option<String> = None;

        for (key, value) in body
            .into_iter()
            .chain(form_urlencoded::parse(query.as_bytes()).into_owned())
        {
            let field = match key.as_ref() {
                "token" => &mut token,
                "slug" => &mut slug,
                _ => continue,
            };
            if field.as_deref().map_or(true, str::is_empty) {
                *field = Some(value);
            }
        }
        trace!("Parsed pull request for slug {slug:?}.");

        SyncRequest {
            token: token.unwrap_or_default(),
            slug: slug.unwrap_or_default(),
        }
    }
}

/// Compare two byte strings without returning early on the first difference.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
