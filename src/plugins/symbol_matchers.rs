use crate::app::AppBuilder;
use crate::matcher::MatcherSource;
use crate::plugin::Plugin;

/// A small library of symbol matchers.
///
/// | symbol | matches | captures |
/// |---|---|---|
/// | `d` | a segment of digits | the digits, as a string |
/// | `w` | a segment of word characters | the segment |
/// | `rest` | everything that remains | it, without the leading `/` |
/// | `opt` | an optional segment | it, or nothing |
/// | `optd` | an optional segment of digits | it, or nothing |
///
/// `opt` and `optd` match even when the segment is absent, consuming
/// nothing.
pub struct SymbolMatchers;

impl Plugin for SymbolMatchers {
    fn name(&self) -> &'static str {
        "symbol_matchers"
    }

    fn setup(&self, app: AppBuilder) -> AppBuilder {
        app.symbol_matcher("d", r"(\d+)")
            .symbol_matcher("w", r"(\w+)")
            .symbol_matcher("rest", "(.*)")
            .symbol_matcher("opt", MatcherSource::Raw("(?:/([^/]+))?".into()))
            .symbol_matcher("optd", MatcherSource::Raw(r"(?:/(\d+))?".into()))
    }
}
