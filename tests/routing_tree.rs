use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arbor::hooks::priority;
use arbor::plugins::{DefaultHeaders, ErrorHandler, Head, HeaderMatchers, ParamsCapturing, SymbolMatchers};
use arbor::{App, AppBuilder, Capture, Error, Matcher, RequestHead, RouteResult};
use http::{Method, StatusCode};

#[derive(Debug, thiserror::Error)]
#[error("db down")]
struct DbDown;

struct Even;

fn call(app: &App, head: RequestHead) -> (StatusCode, String) {
    let res = app.call(head).unwrap();
    (res.status(), res.body_string())
}

fn get(app: &App, path: &str) -> (StatusCode, String) {
    call(app, RequestHead::get(path))
}

fn users_app() -> App {
    App::builder()
        .route(|r| r.on(("users", Matcher::integer()), |_, caps| Ok(format!("user {}", caps.int(0)?))))
        .freeze()
        .unwrap()
}

#[test]
fn integer_segment_is_captured() {
    assert_eq!(get(&users_app(), "/users/42"), (StatusCode::OK, "user 42".to_owned()));
}

#[test]
fn non_integer_segment_is_404() {
    let (status, body) = get(&users_app(), "/users/abc");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[test]
fn nested_hash_branches() {
    let app = App::builder()
        .hash_branch("", "a", |r| r.hash_branches(Some("/a")))
        .hash_branch("/a", "b", |_| Ok("a-b"))
        .route(|r| r.hash_branches(None))
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/a/b").1, "a-b");
    assert_eq!(get(&app, "/a/c").0, StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/b").0, StatusCode::NOT_FOUND);
}

#[test]
fn array_matches_first_alternative() {
    let app = App::builder()
        .route(|r| r.is(Matcher::any(["foo", "bar"]), |_, caps| Ok(format!("got {}", caps.str(0)?))))
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/bar").1, "got bar");
    assert_eq!(get(&app, "/foo").1, "got foo");
    assert_eq!(get(&app, "/baz").0, StatusCode::NOT_FOUND);
}

#[test]
fn host_regex_captures_subdomain() {
    let app = App::builder()
        .plugin(HeaderMatchers)
        .route(|r| {
            r.on(Matcher::hash([("host", Matcher::regex(r"\A(\w+)\.example\.com\z"))]), |_, caps| {
                Ok(format!("tenant {}", caps.str(0)?))
            })
        })
        .freeze()
        .unwrap();
    let head = RequestHead::get("/").header("host", "acme.example.com");
    assert_eq!(call(&app, head).1, "tenant acme");
    let head = RequestHead::get("/").header("host", "example.org");
    assert_eq!(call(&app, head).0, StatusCode::NOT_FOUND);
}

#[test]
fn error_in_committed_branch_skips_siblings() {
    let second = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&second);
    let app = App::builder()
        .route(move |r| {
            r.on("x", |_, _| -> RouteResult { Err(DbDown.into()) })?;
            seen.store(true, Ordering::SeqCst);
            r.on("x", |_, _| Ok("second"))
        })
        .freeze()
        .unwrap();

    let err = app.call(RequestHead::get("/x")).unwrap_err();
    assert!(matches!(err, Error::Application(_)));
    assert!(!second.load(Ordering::SeqCst));
}

#[test]
fn error_handler_renders_500() {
    let app = App::builder()
        .plugin(ErrorHandler::new(|_, err| Ok(format!("failed: {err}"))))
        .route(|r| r.on("x", |_, _| -> RouteResult { Err(DbDown.into()) }))
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/x"), (StatusCode::INTERNAL_SERVER_ERROR, "failed: db down".to_owned()));
}

#[test]
fn failed_match_leaves_no_trace() {
    let app = App::builder()
        .route(|r| {
            r.on(("a", Matcher::integer(), "never"), |_, _| Ok("unreachable"))?;
            r.on("a", |r, _| Ok(format!("rest={} matched={}", r.remaining_path(), r.matched_path())))
        })
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/a/1/b").1, "rest=/1/b matched=/a");
}

#[test]
fn captures_arrive_in_matcher_order() {
    let app = App::builder()
        .route(|r| {
            r.is((Matcher::segment(), "x", Matcher::integer(), Matcher::regex(r"(\w)(\w)")), |_, caps| {
                Ok(format!("{} {} {} {}", caps.str(0)?, caps.int(1)?, caps.str(2)?, caps.str(3)?))
            })
        })
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/foo/x/3/ab").1, "foo 3 a b");
}

#[test]
fn matched_branch_commits_even_when_empty() {
    let app = App::builder()
        .route(|r| {
            r.on("a", |_, _| Ok(()))?;
            r.on("a", |_, _| Ok("sibling"))
        })
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/a"), (StatusCode::NOT_FOUND, String::new()));
}

#[test]
fn hash_branch_behaves_like_on() {
    let linear = App::builder()
        .route(|r| {
            r.on("a", |r, _| {
                r.is("b", |_, _| Ok("b"))?;
                r.is((), |_, _| Ok("a"))
            })
        })
        .freeze()
        .unwrap();
    let hashed = App::builder()
        .hash_branch("", "a", |r| {
            r.is("b", |_, _| Ok("b"))?;
            r.is((), |_, _| Ok("a"))
        })
        .route(|r| r.hash_branches(None))
        .freeze()
        .unwrap();

    for path in ["/a", "/a/b", "/a/c", "/ab", "/"] {
        assert_eq!(get(&linear, path), get(&hashed, path), "{path}");
    }
}

#[test]
fn hash_route_dsl_with_verbs_and_guard() {
    let app = App::builder()
        .plugin(Head)
        .hash_routes("/admin", |h| {
            h.dispatch_from_with("", "admin", |r| {
                if r.header("x-admin").is_none() {
                    return r.halt(StatusCode::UNAUTHORIZED);
                }
                Ok(())
            });
            h.get("stats", |_| Ok("stats"));
            h.post("stats", |_| Ok("reset"));
            h.is_root(|_| Ok("dashboard"));
        })
        .route(|r| r.hash_branches(None))
        .freeze()
        .unwrap();

    let admin = |method: Method, path: &str| RequestHead::new(method, path).header("x-admin", "1");
    assert_eq!(call(&app, admin(Method::GET, "/admin/stats")).1, "stats");
    assert_eq!(call(&app, admin(Method::POST, "/admin/stats")).1, "reset");
    assert_eq!(call(&app, admin(Method::DELETE, "/admin/stats")).0, StatusCode::NOT_FOUND);
    assert_eq!(call(&app, admin(Method::GET, "/admin/")).1, "dashboard");

    let (status, body) = call(&app, admin(Method::HEAD, "/admin/stats"));
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    assert_eq!(get(&app, "/admin/stats").0, StatusCode::UNAUTHORIZED);
}

#[test]
fn autoloaded_branch_is_built_at_freeze() {
    let built = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&built);
    let app = App::builder()
        .autoload_hash_branch("", "reports", move || {
            flag.store(true, Ordering::SeqCst);
            |_: &mut arbor::Request| -> RouteResult<&'static str> { Ok("reports") }
        })
        .route(|r| r.hash_branches(None))
        .freeze()
        .unwrap();
    assert!(built.load(Ordering::SeqCst));
    assert_eq!(get(&app, "/reports").1, "reports");

    let conflict = App::builder()
        .hash_branch("", "reports", |_| Ok("eager"))
        .autoload_hash_branch("", "reports", || |_: &mut arbor::Request| -> RouteResult<&'static str> { Ok("lazy") })
        .freeze();
    assert!(matches!(conflict, Err(Error::Conflict(_))));
}

#[test]
fn converter_rejection_is_a_non_match() {
    let app = App::builder()
        .class_matcher_with::<Even, _>(r"(\d+)", |caps| {
            caps[0].as_str()?.parse::<i64>().ok().filter(|n| n % 2 == 0).map(|n| vec![Capture::Int(n)])
        })
        .route(|r| {
            r.is(Matcher::class::<Even>(), |_, caps| Ok(format!("even {}", caps.int(0)?)))?;
            r.is(Matcher::segment(), |_, caps| Ok(format!("other {}", caps.str(0)?)))
        })
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/4").1, "even 4");
    assert_eq!(get(&app, "/7").1, "other 7");
}

#[test]
fn hooks_run_in_priority_order() {
    let app = App::builder()
        .before(priority::LATE, "late", |r| {
            r.response_mut().write("late;");
            Ok(())
        })
        .before(priority::FIRST, "first", |r| {
            r.response_mut().write("first;");
            Ok(())
        })
        .before(priority::DEFAULT, "default", |r| {
            r.response_mut().write("default;");
            Ok(())
        })
        .after(priority::LAST, "last", |_, res| {
            res.write("after-last");
            Ok(())
        })
        .after(priority::EARLY, "early", |_, res| {
            res.write("after-early;");
            Ok(())
        })
        .route(|_| Ok(()))
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/").1, "first;default;late;after-early;after-last");
}

#[test]
fn reloading_a_plugin_replaces_its_hooks() {
    let app = App::builder()
        .plugin(DefaultHeaders::new().header("x-version", "1"))
        .plugin(DefaultHeaders::new().header("x-version", "2"))
        .route(|_| Ok("ok"))
        .freeze()
        .unwrap();
    let res = app.call(RequestHead::get("/")).unwrap();
    assert_eq!(res.header("x-version"), Some("2"));
    assert_eq!(res.headers().get_all("x-version").iter().count(), 1);
    assert_eq!(app.plugins(), ["default_headers"]);
}

#[test]
fn multi_route_prefers_longest_name() {
    let app = App::builder()
        .named_route("user", "", |_| Ok("user"))
        .named_route("users", "", |_| Ok("users"))
        .named_route("quiet", "", |_| Ok(()))
        .route(|r| r.multi_route_or("", |_, section| Ok(format!("fallback {section}"))))
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/users").1, "users");
    assert_eq!(get(&app, "/user").1, "user");
    assert_eq!(get(&app, "/quiet").1, "fallback quiet");
    assert_eq!(get(&app, "/usersx").0, StatusCode::NOT_FOUND);
}

#[test]
fn unknown_named_route_is_an_error() {
    let app = App::builder()
        .route(|r| {
            r.route("missing", "")?;
            Ok(())
        })
        .freeze()
        .unwrap();
    let err = app.call(RequestHead::get("/")).unwrap_err();
    assert!(matches!(err, Error::UnknownRoute { ref name, .. } if name == "missing"));
}

#[test]
fn symbol_captures_become_params() {
    let app = App::builder()
        .plugin(SymbolMatchers)
        .plugin(ParamsCapturing)
        .route(|r| {
            r.on(("posts", Matcher::symbol("d")), |r, _| {
                r.is(("comments", Matcher::symbol("w")), |r, _| {
                    Ok(format!("{}/{}", r.param("d").unwrap_or("-"), r.param("w").unwrap_or("-")))
                })
            })
        })
        .freeze()
        .unwrap();
    assert_eq!(get(&app, "/posts/12/comments/top").1, "12/top");
}

#[test]
fn child_application_extends_parent() {
    let parent = App::builder()
        .plugin(SymbolMatchers)
        .named_route("admin", "", |_| Ok("admin"))
        .route(|r| r.multi_route(""))
        .freeze()
        .unwrap();
    let child = AppBuilder::inherit(&parent)
        .named_route("api", "", |_| Ok("api"))
        .symbol_matcher("slug", "([a-z-]+)")
        .freeze()
        .unwrap();

    assert_eq!(get(&child, "/admin").1, "admin");
    assert_eq!(get(&child, "/api").1, "api");
    assert_eq!(get(&parent, "/api").0, StatusCode::NOT_FOUND);
}

#[test]
fn child_verbs_add_to_parent_verbs_on_the_same_path() {
    let parent = App::builder()
        .hash_routes("", |h| {
            h.get("stats", |_| Ok("parent get"));
        })
        .route(|r| r.hash_routes(None))
        .freeze()
        .unwrap();
    let child = AppBuilder::inherit(&parent)
        .hash_routes("", |h| {
            h.post("stats", |_| Ok("child post"));
        })
        .freeze()
        .unwrap();

    assert_eq!(get(&child, "/stats").1, "parent get");
    assert_eq!(call(&child, RequestHead::post("/stats")).1, "child post");
    assert_eq!(call(&parent, RequestHead::post("/stats")).0, StatusCode::NOT_FOUND);
}
