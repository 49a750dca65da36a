//! Before/after hooks around routing.
//!
//! Plugins register hooks into numbered priority slots. When the application
//! is frozen the slots are sorted (priority, then registration order) and
//! folded into one closure per phase, so a request pays for exactly the
//! hooks that exist and nothing else.
//!
//! | phase | runs | may |
//! |---|---|---|
//! | before | before any matcher | halt with a response, fail |
//! | after | once a finished response exists | mutate headers and body, fail |
//!
//! An after hook receives the response by `&mut` and must edit it in place;
//! other hooks further down the chain see the same object.

use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::dispatch::RouteResult;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Conventional slot numbers. Lower runs first in both phases.
pub mod priority {
    pub const FIRST: u8 = 10;
    pub const EARLY: u8 = 30;
    pub const DEFAULT: u8 = 50;
    pub const LATE: u8 = 80;
    pub const LAST: u8 = 90;
}

pub type BeforeHook = Arc<dyn Fn(&mut Request) -> RouteResult + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync>;

#[derive(Clone)]
struct Slot<H> {
    priority: u8,
    seq: usize,
    name: &'static str,
    hook: H,
}

/// Registration side. Re-registering a name replaces the hook in its
/// original position, so configuring a plugin twice does not run it twice.
#[derive(Clone, Default)]
pub(crate) struct HookChainBuilder {
    before: Vec<Slot<BeforeHook>>,
    after: Vec<Slot<AfterHook>>,
    seq: usize,
}

impl HookChainBuilder {
    pub(crate) fn inherit(parent: &HookChain) -> Self {
        let before = parent.before.iter().map(|s| s.seq).max().unwrap_or(0);
        let after = parent.after.iter().map(|s| s.seq).max().unwrap_or(0);
        let seq = before.max(after);
        Self { before: parent.before.clone(), after: parent.after.clone(), seq }
    }

    pub(crate) fn before(&mut self, priority: u8, name: &'static str, hook: BeforeHook) {
        self.seq += 1;
        upsert(&mut self.before, Slot { priority, seq: self.seq, name, hook });
    }

    pub(crate) fn after(&mut self, priority: u8, name: &'static str, hook: AfterHook) {
        self.seq += 1;
        upsert(&mut self.after, Slot { priority, seq: self.seq, name, hook });
    }

    pub(crate) fn compose(mut self) -> HookChain {
        self.before.sort_by_key(|s| (s.priority, s.seq));
        self.after.sort_by_key(|s| (s.priority, s.seq));

        let noop_before: BeforeHook = Arc::new(|_: &mut Request| -> RouteResult { Ok(()) });
        let run_before = self.before.iter().rev().fold(noop_before, |next, slot| {
            let hook = Arc::clone(&slot.hook);
            let composed: BeforeHook = Arc::new(move |req: &mut Request| -> RouteResult {
                hook(req)?;
                next(req)
            });
            composed
        });

        let noop_after: AfterHook =
            Arc::new(|_: &Request, _: &mut Response| -> Result<(), Error> { Ok(()) });
        let run_after = self.after.iter().rev().fold(noop_after, |next, slot| {
            let hook = Arc::clone(&slot.hook);
            let composed: AfterHook =
                Arc::new(move |req: &Request, res: &mut Response| -> Result<(), Error> {
                    hook(req, res)?;
                    next(req, res)
                });
            composed
        });

        HookChain { before: self.before, after: self.after, run_before, run_after }
    }
}

fn upsert<H>(slots: &mut Vec<Slot<H>>, slot: Slot<H>) {
    match slots.iter_mut().find(|s| s.name == slot.name) {
        Some(existing) => {
            existing.priority = slot.priority;
            existing.hook = slot.hook;
        }
        None => slots.push(slot),
    }
}

/// The frozen, composed chain.
pub(crate) struct HookChain {
    before: Vec<Slot<BeforeHook>>,
    after: Vec<Slot<AfterHook>>,
    run_before: BeforeHook,
    run_after: AfterHook,
}

impl HookChain {
    pub(crate) fn run_before(&self, req: &mut Request) -> RouteResult {
        (self.run_before)(req)
    }

    pub(crate) fn run_after(&self, req: &Request, res: &mut Response) -> Result<(), Error> {
        (self.run_after)(req, res)
    }

    /// After hooks for a response produced by the error handler. A failing
    /// hook is logged and skipped; the error response is always kept.
    pub(crate) fn run_after_lenient(&self, req: &Request, res: &mut Response) {
        for slot in &self.after {
            if let Err(err) = (slot.hook)(req, res) {
                error!(hook = slot.name, error = %err, "after hook failed while handling an error");
            }
        }
    }

    pub(crate) fn names(&self) -> (Vec<&'static str>, Vec<&'static str>) {
        (
            self.before.iter().map(|s| s.name).collect(),
            self.after.iter().map(|s| s.name).collect(),
        )
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (before, after) = self.names();
        f.debug_struct("HookChain").field("before", &before).field("after", &after).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn after(tag: &'static str) -> AfterHook {
        Arc::new(move |_: &Request, res: &mut Response| -> Result<(), Error> {
            res.write(tag);
            Ok(())
        })
    }

    #[test]
    fn slots_sort_by_priority_then_registration() {
        let mut b = HookChainBuilder::default();
        b.after(priority::LATE, "late", after("c"));
        b.after(priority::FIRST, "first", after("a"));
        b.after(priority::LATE, "late2", after("d"));
        b.after(priority::DEFAULT, "mid", after("b"));
        let chain = b.compose();
        assert_eq!(chain.names().1, vec!["first", "mid", "late", "late2"]);
    }

    #[test]
    fn same_name_replaces_in_place() {
        let mut b = HookChainBuilder::default();
        b.after(priority::DEFAULT, "x", after("1"));
        b.after(priority::DEFAULT, "y", after("2"));
        b.after(priority::DEFAULT, "x", after("3"));
        let chain = b.compose();
        assert_eq!(chain.names().1, vec!["x", "y"]);
    }

    #[test]
    fn inherit_keeps_parent_slots_first() {
        let mut parent = HookChainBuilder::default();
        parent.after(priority::DEFAULT, "parent", after("p"));
        let parent = parent.compose();

        let mut child = HookChainBuilder::inherit(&parent);
        child.after(priority::DEFAULT, "child", after("c"));
        assert_eq!(child.compose().names().1, vec!["parent", "child"]);
    }
}
