//! Behavioural tests for receiver shutdown.

use std::cell::RefCell;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;

use crate::codec::Envelope;
use crate::pool::PoolError;
use crate::receiver::ShutdownOutcome;
use crate::tests::support::{RecordingHandler, ReceiverWorld, receiver_world};

#[fixture]
fn world() -> RefCell<ReceiverWorld> {
    receiver_world()
}

#[given("a started receiver")]
fn given_started_receiver(world: &RefCell<ReceiverWorld>) {
    world.borrow_mut().start();
}

#[given("a started receiver whose handler takes {millis} milliseconds")]
fn given_slow_receiver(world: &RefCell<ReceiverWorld>, millis: u64) {
    let mut world = world.borrow_mut();
    world.handler = RecordingHandler::default().slow(Duration::from_millis(millis));
    world.start();
}

#[given("a drain grace period of {millis} milliseconds")]
fn given_grace(world: &RefCell<ReceiverWorld>, millis: u64) {
    world.borrow_mut().drain_timeout = Some(Duration::from_millis(millis));
}

#[when("an agent sends slow work")]
fn when_agent_sends(world: &RefCell<ReceiverWorld>) {
    world
        .borrow()
        .send_message(&Envelope::new("span", json!({"trace": 2})));
    std::thread::sleep(Duration::from_millis(20));
}

#[when("the receiver stops")]
fn when_receiver_stops(world: &RefCell<ReceiverWorld>) {
    world.borrow_mut().stop();
}

#[when("work is submitted to the dispatch pool")]
fn when_work_submitted(world: &RefCell<ReceiverWorld>) {
    world.borrow_mut().submit_task();
}

#[then("every stop after the first reports already stopped")]
fn then_later_stops_noop(world: &RefCell<ReceiverWorld>) {
    let world = world.borrow();
    assert_eq!(
        world.outcomes,
        vec![ShutdownOutcome::Drained, ShutdownOutcome::AlreadyStopped]
    );
    assert_eq!(world.acceptor.closes(), 1, "acceptor closed once");
}

#[then("the submission is rejected")]
fn then_submission_rejected(world: &RefCell<ReceiverWorld>) {
    let world = world.borrow();
    assert!(matches!(
        world.submit_result,
        Some(Err(PoolError::Shutdown { .. }))
    ));
}

#[then("the stop reports a drain timeout within {millis} milliseconds")]
fn then_stop_timed_out(world: &RefCell<ReceiverWorld>, millis: u64) {
    let world = world.borrow();
    assert_eq!(world.outcomes, vec![ShutdownOutcome::TimedOut]);
    let elapsed = world.stop_elapsed.expect("stop should have run");
    assert!(
        elapsed < Duration::from_millis(millis),
        "stop took {elapsed:?}"
    );
}

#[scenario(path = "tests/features/receiver_shutdown.feature")]
fn receiver_shutdown(#[from(world)] world: RefCell<ReceiverWorld>) {
    let _ = world;
}

#[scenario(path = "tests/features/receiver_drain_timeout.feature")]
fn receiver_drain_timeout(#[from(world)] world: RefCell<ReceiverWorld>) {
    let _ = world;
}
