use crate::app::AppBuilder;
use crate::plugin::Plugin;

/// Records symbol-matcher captures as named params.
///
/// Once loaded, `Matcher::symbol("id")` that captured `"42"` makes
/// `r.param("id")` return `Some("42")` in nested blocks, and
/// [`Request::captures_param`](crate::Request::captures_param) lists every
/// capture of every matched level.
pub struct ParamsCapturing;

impl Plugin for ParamsCapturing {
    fn name(&self) -> &'static str {
        "params_capturing"
    }

    fn setup(&self, mut app: AppBuilder) -> AppBuilder {
        app.options_mut().params_capturing = true;
        app
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, Capture, Matcher, MatcherSource, RequestHead};

    #[test]
    fn symbol_captures_become_params() {
        let app = App::builder()
            .plugin(ParamsCapturing)
            .symbol_matcher("id", r"(\d+)")
            .symbol_matcher("slug", MatcherSource::Raw(r"/([a-z]+)-([a-z]+)".into()))
            .route(|r| {
                r.on(("posts", Matcher::symbol("id")), |r, _| {
                    r.is(Matcher::symbol("slug"), |r, _| {
                        let slug = r.captured_params().iter().find(|(k, _)| k == "slug").map(|(_, v)| v);
                        let expected = Capture::List(vec!["hello".into(), "world".into()]);
                        Ok(format!(
                            "{} {} {}",
                            r.param("id").unwrap_or("-"),
                            slug == Some(&expected),
                            r.captures_param().len()
                        ))
                    })
                })
            })
            .freeze()
            .unwrap();
        let res = app.call(RequestHead::get("/posts/7/hello-world")).unwrap();
        assert_eq!(res.body_string(), "7 true 3");
    }

    #[test]
    fn params_are_not_recorded_without_the_plugin() {
        let app = App::builder()
            .symbol_matcher("id", r"(\d+)")
            .route(|r| r.is(Matcher::symbol("id"), |r, _| Ok(r.param("id").unwrap_or("none").to_owned())))
            .freeze()
            .unwrap();
        assert_eq!(app.call(RequestHead::get("/7")).unwrap().body_string(), "none");
    }
}
