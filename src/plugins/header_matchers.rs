use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};

use crate::app::AppBuilder;
use crate::capture::Capture;
use crate::dispatch::string_values;
use crate::error::Error;
use crate::matcher::Matcher;
use crate::plugin::Plugin;
use crate::request::Request;

/// Hash matchers over request headers.
///
/// | key | value | matches | captures |
/// |---|---|---|---|
/// | `header` | header name | header present | its value |
/// | `host` | string | `Host` equal, port ignored | nothing |
/// | `host` | regex | `Host` matches | the groups |
/// | `user_agent` | regex | `User-Agent` matches | the groups |
/// | `accept` | mime type | listed in `Accept` | nothing; sets `Content-Type` |
///
/// ```rust
/// use arbor::{App, Matcher, RequestHead};
/// use arbor::plugins::HeaderMatchers;
///
/// let app = App::builder()
///     .plugin(HeaderMatchers)
///     .route(|r| {
///         r.on(Matcher::hash([("host", Matcher::regex(r"\A(\w+)\.example\.com\z"))]), |_, caps| {
///             Ok(format!("sub={}", caps.str(0)?))
///         })
///     })
///     .freeze()
///     .unwrap();
///
/// let res = app.call(RequestHead::get("/").header("host", "api.example.com")).unwrap();
/// assert_eq!(res.body_string(), "sub=api");
/// ```
pub struct HeaderMatchers;

impl Plugin for HeaderMatchers {
    fn name(&self) -> &'static str {
        "header_matchers"
    }

    fn setup(&self, app: AppBuilder) -> AppBuilder {
        app.hash_matcher("header", match_header)
            .hash_matcher("host", match_host)
            .hash_matcher("user_agent", match_user_agent)
            .hash_matcher("accept", match_accept)
    }
}

fn single<'m>(key: &str, m: &'m Matcher) -> Result<&'m str, Error> {
    match string_values(key, m)?.as_slice() {
        [value] => Ok(*value),
        _ => Err(Error::UnsupportedMatcher(format!("`{key}` expects one string"))),
    }
}

/// Matches an unanchored regex against `value` and pushes its groups.
fn match_regex(r: &mut Request, source: &str, value: Option<String>) -> Result<bool, Error> {
    let Some(value) = value else {
        return Ok(false);
    };
    let regex = r.app.patterns.plain(source)?;
    let Some(caps) = regex.captures(&value) else {
        return Ok(false);
    };
    for group in caps.iter().skip(1) {
        r.cursor.push(group.map_or(Capture::None, |m| Capture::Str(m.as_str().to_owned())));
    }
    Ok(true)
}

fn match_header(r: &mut Request, m: &Matcher) -> Result<bool, Error> {
    let name = single("header", m)?;
    match r.header(name).map(str::to_owned) {
        Some(value) => {
            r.cursor.push(Capture::Str(value));
            Ok(true)
        }
        None => Ok(false),
    }
}

fn match_host(r: &mut Request, m: &Matcher) -> Result<bool, Error> {
    let host = r.host().map(str::to_owned);
    match m {
        Matcher::Str(expected) => Ok(host.as_deref() == Some(&**expected)),
        Matcher::Regex(source) => match_regex(r, source, host),
        other => Err(Error::UnsupportedMatcher(format!("`host` expects a string or regex, got {}", other.kind()))),
    }
}

fn match_user_agent(r: &mut Request, m: &Matcher) -> Result<bool, Error> {
    let agent = r.header(USER_AGENT.as_str()).map(str::to_owned);
    match m {
        Matcher::Regex(source) => match_regex(r, source, agent),
        other => Err(Error::UnsupportedMatcher(format!("`user_agent` expects a regex, got {}", other.kind()))),
    }
}

fn match_accept(r: &mut Request, m: &Matcher) -> Result<bool, Error> {
    let mime = single("accept", m)?;
    let accepted = r
        .header(ACCEPT.as_str())
        .is_some_and(|accept| accept.split(',').any(|item| item.split(';').next().map(str::trim) == Some(mime)));
    if accepted {
        r.response_mut().set_header(CONTENT_TYPE, mime);
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::{App, RequestHead};

    fn app() -> App {
        App::builder()
            .plugin(HeaderMatchers)
            .route(|r| {
                r.on(Matcher::hash([("header", "x-token")]), |_, caps| Ok(format!("token {}", caps.str(0)?)))?;
                r.on(Matcher::hash([("host", "admin.test")]), |_, _| Ok("admin"))?;
                r.on(Matcher::hash([("user_agent", Matcher::regex(r"curl/(\d+)"))]), |_, caps| {
                    Ok(format!("curl {}", caps.str(0)?))
                })?;
                r.on(Matcher::hash([("accept", "text/csv")]), |_, _| Ok("a,b"))
            })
            .freeze()
            .unwrap()
    }

    fn call(head: RequestHead) -> (StatusCode, String, Option<String>) {
        let res = app().call(head).unwrap();
        (res.status(), res.body_string(), res.header("content-type").map(str::to_owned))
    }

    #[test]
    fn header_captures_value() {
        assert_eq!(call(RequestHead::get("/").header("x-token", "abc")).1, "token abc");
    }

    #[test]
    fn host_string_ignores_port() {
        assert_eq!(call(RequestHead::get("/").header("host", "admin.test:8080")).1, "admin");
        assert_eq!(call(RequestHead::get("/").header("host", "www.test")).0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn user_agent_captures_groups() {
        assert_eq!(call(RequestHead::get("/").header("user-agent", "curl/8")).1, "curl 8");
    }

    #[test]
    fn accept_sets_content_type() {
        let (status, body, ct) = call(RequestHead::get("/").header("accept", "text/html, text/csv;q=0.9"));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "a,b");
        assert_eq!(ct.as_deref(), Some("text/csv"));
    }

    #[test]
    fn host_regex_without_subdomain_does_not_match() {
        let app = App::builder()
            .plugin(HeaderMatchers)
            .route(|r| {
                r.on(Matcher::hash([("host", Matcher::regex(r"\A(\w+)\.example\.com\z"))]), |_, caps| {
                    Ok(format!("sub={}", caps.str(0)?))
                })
            })
            .freeze()
            .unwrap();
        let res = app.call(RequestHead::get("/").header("host", "example.com")).unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
