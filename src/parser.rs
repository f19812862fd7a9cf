use crate::error::ParseError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use reqwest::Url;
use std::fmt;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Landing,
    Tasks,
    Weather,
}

impl Route {
    fn path(self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Tasks => "/tasks",
            Route::Weather => "/weather",
        }
    }
}

/// Where the shell is, and who is acting. An empty email is a valid
/// identity; fetches that need one are simply skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub route: Route,
    pub email: String,
}

impl Location {
    pub fn new(route: Route, email: impl Into<String>) -> Self {
        Location {
            route,
            email: email.into(),
        }
    }

    pub fn landing() -> Self {
        Location::new(Route::Landing, "")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.route == Route::Landing {
            return write!(f, "/");
        }
        let mut url = Url::parse(LOCAL_BASE)
            .and_then(|base| base.join(self.route.path()))
            .map_err(|_| fmt::Error)?;
        url.query_pairs_mut().append_pair("email", &self.email);
        write!(f, "{}?{}", url.path(), url.query().unwrap_or(""))
    }
}

// Relative locations are resolved against this before matching routes.
const LOCAL_BASE: &str = "http://localhost/";

/// Parses a start location such as `/tasks?email=a@b.c`, `weather?email=x`,
/// a full URL, or a bare `?email=` query (which keeps `default_route`).
pub fn parse_location(input: &str, default_route: Route) -> Result<Location, ParseError> {
    let input = input.trim();
    let url = Url::parse(input)
        .or_else(|_| {
            let relative = if input.starts_with('/') || input.starts_with('?') {
                input.to_string()
            } else {
                format!("/{}", input)
            };
            Url::parse(LOCAL_BASE).and_then(|base| base.join(&relative))
        })
        .map_err(|_| ParseError::UnknownRoute(input.to_string()))?;

    let route = if input.starts_with('?') {
        default_route
    } else {
        match url.path().trim_matches('/') {
            "" => Route::Landing,
            "tasks" => Route::Tasks,
            "weather" => Route::Weather,
            other => return Err(ParseError::UnknownRoute(other.to_string())),
        }
    };

    Ok(Location::new(route, email_param(&url)))
}

fn email_param(url: &Url) -> String {
    url.query_pairs()
        .find(|(key, _)| key == "email")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Truncates any richer timestamp to `YYYY-MM-DD` (UTC). Returns an empty
/// string when nothing date-like can be recovered.
pub fn normalize_due_date(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return String::new();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return format_date(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return format_date(dt.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return format_date(date);
    }

    // Offsets without a colon and similar near-ISO shapes
    date_prefix()
        .captures(input)
        .and_then(|caps| caps.get(1))
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        .map(format_date)
        .unwrap_or_default()
}

fn date_prefix() -> &'static Regex {
    static DATE_PREFIX: OnceLock<Regex> = OnceLock::new();
    DATE_PREFIX.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})[T ]").unwrap())
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
