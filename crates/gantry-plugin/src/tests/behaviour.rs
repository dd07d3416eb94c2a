//! Behaviour-driven tests for context shutdown.

use std::sync::Arc;

use gantry_config::HostConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use super::CountingPlugin;
use crate::context::{PluginContext, RequestScope};
use crate::error::CloseErrors;
use crate::host::PluginHost;

struct ContextWorld {
    context: PluginContext,
    scopes: Vec<RequestScope>,
    late: Option<RequestScope>,
    plugins: Vec<Arc<CountingPlugin>>,
    closes: Vec<Result<(), CloseErrors>>,
}

#[fixture]
fn world() -> ContextWorld {
    ContextWorld {
        context: PluginContext::new(&HostConfig::default()),
        scopes: Vec::new(),
        late: None,
        plugins: Vec::new(),
        closes: Vec::new(),
    }
}

fn attach_plugins(world: &mut ContextWorld, count: usize, fail_close: bool) {
    let host = Arc::new(PluginHost::new(None));
    for index in 0..count {
        let plugin = CountingPlugin::new(format!("plugin-{index}"), fail_close);
        host.register(plugin.clone());
        world.plugins.push(plugin);
    }
    world.context = world.context.clone().with_host(host);
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("an open plugin context")]
fn given_open_context(world: &mut ContextWorld) {
    assert!(!world.context.is_closed());
}

#[given("{count} outstanding requests")]
fn given_outstanding(world: &mut ContextWorld, count: usize) {
    world
        .scopes
        .extend((0..count).map(|_| world.context.request()));
    assert_eq!(world.context.outstanding(), count);
}

#[given("a host managing {count} healthy plugins")]
fn given_healthy_plugins(world: &mut ContextWorld, count: usize) {
    attach_plugins(world, count, false);
}

#[given("a host managing {count} failing plugins")]
fn given_failing_plugins(world: &mut ContextWorld, count: usize) {
    attach_plugins(world, count, true);
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the context is closed")]
fn when_closed(world: &mut ContextWorld) {
    let result = world.context.close();
    world.closes.push(result);
}

#[when("a new request is issued")]
fn when_new_request(world: &mut ContextWorld) {
    world.late = Some(world.context.request());
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("every outstanding request is cancelled")]
fn then_all_cancelled(world: &mut ContextWorld) {
    assert!(world.scopes.iter().all(RequestScope::is_cancelled));
}

#[then("no requests remain registered")]
fn then_none_registered(world: &mut ContextWorld) {
    assert_eq!(world.context.outstanding(), 0);
}

#[then("the new request is already cancelled")]
fn then_late_cancelled(world: &mut ContextWorld) {
    let scope = world.late.as_ref().expect("no request issued");
    assert!(scope.is_cancelled());
    assert!(scope.check().is_err());
}

#[then("each plugin was closed {times} time(s)")]
fn then_closed_times(world: &mut ContextWorld, times: usize) {
    for plugin in &world.plugins {
        assert_eq!(plugin.closes(), times, "plugin {}", plugin.name);
    }
    assert!(world.closes.iter().all(Result::is_ok));
}

#[then("closing reports {count} failure(s)")]
fn then_close_failures(world: &mut ContextWorld, count: usize) {
    let first = world.closes.first().expect("context was not closed");
    let errors = first.as_ref().expect_err("close should fail");
    assert_eq!(errors.failures().len(), count, "{errors}");
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/context_shutdown.feature",
    name = "Closing the context cancels outstanding requests"
)]
fn close_cancels_outstanding_requests(world: ContextWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/context_shutdown.feature",
    name = "Requests issued after close are cancelled immediately"
)]
fn late_requests_are_cancelled(world: ContextWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/context_shutdown.feature",
    name = "Closing twice closes each plugin once"
)]
fn double_close_closes_plugins_once(world: ContextWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/context_shutdown.feature",
    name = "Close failures from every plugin are reported together"
)]
fn close_failures_are_joined(world: ContextWorld) {
    let _ = world;
}
