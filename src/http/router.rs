//! Request router.
//!
//! A small static table of path templates.  Templates are literal text with
//! `{name}` placeholders, e.g. `/{action}_{id}`.  A placeholder captures the
//! shortest non-empty run of bytes up to the next literal (or the end of
//! the path).  Adjacent placeholders are rejected at registration since
//! they cannot be split unambiguously.
//!
//! Routes are registered at startup and the table is sealed before the
//! server starts serving.

use core::fmt;

use heapless::Vec;

use crate::control::actuator::Motion;

/// Registered routes.
pub const MAX_ROUTES: usize = 8;
/// Placeholders per template.
pub const MAX_PARAMS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Other,
}

/// What a registered route is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Static HTML page.
    ControlPage,
    /// `/{action}_{id}` motion command.
    ActuatorMotion,
    /// Queue the timed profile.
    MotionProfile,
}

/// A fully validated request target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    ControlPage,
    Motion { id: u8, motion: Motion },
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    NotFound,
    MethodNotAllowed,
    UnknownAction,
    InvalidId,
    /// Registration after [`Router::seal`].
    Sealed,
    TableFull,
    BadTemplate,
}

impl RouteError {
    pub const fn status(self) -> u16 {
        match self {
            Self::NotFound | Self::UnknownAction => 404,
            Self::MethodNotAllowed => 405,
            Self::InvalidId => 400,
            Self::Sealed | Self::TableFull | Self::BadTemplate => 500,
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::MethodNotAllowed => write!(f, "method not allowed"),
            Self::UnknownAction => write!(f, "unknown action"),
            Self::InvalidId => write!(f, "invalid actuator id"),
            Self::Sealed => write!(f, "route table sealed"),
            Self::TableFull => write!(f, "route table full"),
            Self::BadTemplate => write!(f, "malformed route template"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Template matching
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'t> {
    Literal(&'t str),
    Param(&'t str),
}

/// Captured placeholders, in template order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Params<'a> {
    pairs: Vec<(&'a str, &'a str), MAX_PARAMS>,
}

impl<'a> Params<'a> {
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.pairs.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn tokenize(template: &str) -> Result<Vec<Token<'_>, { 2 * MAX_PARAMS + 1 }>, RouteError> {
    let mut tokens = Vec::new();
    let mut rest = template;
    while !rest.is_empty() {
        let token = if let Some(after) = rest.strip_prefix('{') {
            let end = after.find('}').ok_or(RouteError::BadTemplate)?;
            let name = &after[..end];
            if name.is_empty() || name.contains('{') {
                return Err(RouteError::BadTemplate);
            }
            if matches!(tokens.last(), Some(Token::Param(_))) {
                return Err(RouteError::BadTemplate);
            }
            rest = &after[end + 1..];
            Token::Param(name)
        } else {
            let end = rest.find(['{', '}']).unwrap_or(rest.len());
            if end == 0 {
                // stray '}'
                return Err(RouteError::BadTemplate);
            }
            let lit = &rest[..end];
            rest = &rest[end..];
            Token::Literal(lit)
        };
        tokens.push(token).map_err(|_| RouteError::BadTemplate)?;
    }
    Ok(tokens)
}

/// Check that `template` is well formed.
pub fn validate_template(template: &str) -> Result<(), RouteError> {
    if !template.starts_with('/') {
        return Err(RouteError::BadTemplate);
    }
    tokenize(template).map(|_| ())
}

/// Match `path` against `template`.  `None` if it does not match or the
/// template is malformed.  Never panics.
pub fn match_template<'a>(template: &'a str, path: &'a str) -> Option<Params<'a>> {
    let tokens = tokenize(template).ok()?;
    let mut params = Params::default();
    let mut rest = path;

    for (i, token) in tokens.iter().enumerate() {
        match *token {
            Token::Literal(lit) => rest = rest.strip_prefix(lit)?,
            Token::Param(name) => {
                let end = match tokens.get(i + 1) {
                    Some(Token::Literal(next)) => rest.get(1..)?.find(*next)? + 1,
                    _ => rest.len(),
                };
                if end == 0 {
                    return None;
                }
                let (value, tail) = rest.split_at(end);
                params.pairs.push((name, value)).ok()?;
                rest = tail;
            }
        }
    }
    rest.is_empty().then_some(params)
}

/// Drop a `?query` suffix.
pub fn strip_query(uri: &str) -> &str {
    uri.split_once('?').map_or(uri, |(path, _)| path)
}

/// Strict decimal id: non-empty, ASCII digits only, within `1..=max`.
pub fn parse_id(s: &str, max: u8) -> Result<u8, RouteError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RouteError::InvalidId);
    }
    let id: u8 = s.parse().map_err(|_| RouteError::InvalidId)?;
    if !(1..=max).contains(&id) {
        return Err(RouteError::InvalidId);
    }
    Ok(id)
}

// ───────────────────────────────────────────────────────────────
// Router
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Route {
    template: &'static str,
    method: Method,
    endpoint: Endpoint,
}

pub struct Router {
    routes: Vec<Route, MAX_ROUTES>,
    sealed: bool,
    actuator_count: u8,
}

impl Router {
    pub fn new(actuator_count: u8) -> Self {
        Self {
            routes: Vec::new(),
            sealed: false,
            actuator_count,
        }
    }

    /// The firmware's route table, sealed.
    pub fn standard(actuator_count: u8) -> Result<Self, RouteError> {
        let mut r = Self::new(actuator_count);
        r.register("/", Method::Get, Endpoint::ControlPage)?;
        r.register("/activate", Method::Get, Endpoint::MotionProfile)?;
        r.register("/{action}_{id}", Method::Get, Endpoint::ActuatorMotion)?;
        r.seal();
        Ok(r)
    }

    pub fn register(
        &mut self,
        template: &'static str,
        method: Method,
        endpoint: Endpoint,
    ) -> Result<(), RouteError> {
        if self.sealed {
            return Err(RouteError::Sealed);
        }
        validate_template(template)?;
        self.routes
            .push(Route {
                template,
                method,
                endpoint,
            })
            .map_err(|_| RouteError::TableFull)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn actuator_count(&self) -> u8 {
        self.actuator_count
    }

    /// First route whose template matches wins.  A path that matches only
    /// routes with other methods is `MethodNotAllowed`.
    pub fn resolve(&self, method: Method, uri: &str) -> Result<Resolved, RouteError> {
        let path = strip_query(uri);
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = match_template(route.template, path) else {
                continue;
            };
            if route.method != method {
                path_matched = true;
                continue;
            }
            return self.bind(route.endpoint, &params);
        }

        Err(if path_matched {
            RouteError::MethodNotAllowed
        } else {
            RouteError::NotFound
        })
    }

    fn bind(&self, endpoint: Endpoint, params: &Params<'_>) -> Result<Resolved, RouteError> {
        match endpoint {
            Endpoint::ControlPage => Ok(Resolved::ControlPage),
            Endpoint::MotionProfile => Ok(Resolved::Profile),
            Endpoint::ActuatorMotion => {
                let motion = params
                    .get("action")
                    .and_then(|a| a.parse::<Motion>().ok())
                    .ok_or(RouteError::UnknownAction)?;
                let id = parse_id(params.get("id").unwrap_or(""), self.actuator_count)?;
                Ok(Resolved::Motion { id, motion })
            }
        }
    }
}
