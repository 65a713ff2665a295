//! Child state machines started from a parent's scopes.

use flowstate::action_of;
use flowstate::builder::StateMachineSpec;
use flowstate::core::{ChangedState, ExecutionPolicy, State};
use flowstate::error::{BoxError, FlowError};
use flowstate::machine::{StateMachine, StateMachineFactory};
use flowstate::store::StateStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

async fn next<S: State>(states: &mut StateStream<S>) -> S {
    timeout(Duration::from_secs(5), states.next())
        .await
        .expect("timed out waiting for a state")
        .expect("state stream ended")
        .expect("machine failed")
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Progress {
    id: u32,
    percent: u8,
}

#[derive(Clone, Debug)]
enum ChildAction {
    Boost,
    Fail,
}

/// Child advancing by 50% every `step` until it reaches 100%.
fn progress_factory(step: Duration) -> StateMachineFactory<Progress, ChildAction> {
    let spec = StateMachineSpec::new()
        .in_state(
            |progress: &Progress| progress.percent < 100,
            move |scope| {
                scope.until_identity_changes(
                    |progress| progress.percent,
                    move |scope| {
                        scope.on_enter(move |_| async move {
                            sleep(step).await;
                            Ok::<_, BoxError>(ChangedState::mutate(|progress: Progress| Progress {
                                percent: progress.percent + 50,
                                ..progress
                            }))
                        })
                    },
                )
            },
        )
        .in_any_state(|scope| {
            scope
                .on(
                    action_of!(ChildAction::Boost),
                    ExecutionPolicy::Ordered,
                    |_, _| async {
                        Ok::<_, BoxError>(ChangedState::mutate(|progress: Progress| Progress {
                            percent: 100,
                            ..progress
                        }))
                    },
                )
                .on_action_effect(
                    action_of!(ChildAction::Fail),
                    ExecutionPolicy::Ordered,
                    |_, _| async { Err::<(), BoxError>("disk full".into()) },
                )
        });
    StateMachineFactory::new(|| Progress { id: 0, percent: 0 }, spec).unwrap()
}

/// Every child machine a parent launched, in launch order.
type Launched = Arc<Mutex<Vec<StateMachine<Progress, ChildAction>>>>;

#[derive(Clone, Debug, PartialEq, Default)]
struct Downloads {
    items: BTreeMap<u32, u8>,
}

#[derive(Clone, Debug)]
enum DownloadAction {
    Start(u32),
    BoostAll,
    FailAll,
}

fn downloads(step: Duration) -> StateMachineFactory<Downloads, DownloadAction> {
    downloads_tracked(step, Launched::default())
}

fn downloads_tracked(
    step: Duration,
    launched: Launched,
) -> StateMachineFactory<Downloads, DownloadAction> {
    let children = progress_factory(step);
    let spec = StateMachineSpec::new().in_any_state(move |scope| {
        scope.on_action_start_state_machine(
            action_of!(DownloadAction::Start(id) => *id),
            move |id, _: &Downloads| {
                let child = children.launch_from(Progress { id, percent: 0 });
                launched.lock().push(child.clone());
                child
            },
            |action: &DownloadAction| match action {
                DownloadAction::BoostAll => Some(ChildAction::Boost),
                DownloadAction::FailAll => Some(ChildAction::Fail),
                DownloadAction::Start(_) => None,
            },
            |_: &Downloads, progress: Progress| {
                ChangedState::mutate(move |mut downloads: Downloads| {
                    downloads.items.insert(progress.id, progress.percent);
                    downloads
                })
            },
        )
    });
    StateMachineFactory::new(Downloads::default, spec).unwrap()
}

async fn wait_for(states: &mut StateStream<Downloads>, expected: &[(u32, u8)]) {
    let expected: BTreeMap<u32, u8> = expected.iter().copied().collect();
    loop {
        if next(states).await.items == expected {
            return;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn distinct_triggers_run_side_by_side() {
    let machine = downloads(Duration::from_millis(10)).launch();
    let mut states = machine.state();
    next(&mut states).await;

    machine.dispatch(DownloadAction::Start(1)).unwrap();
    machine.dispatch(DownloadAction::Start(2)).unwrap();

    wait_for(&mut states, &[(1, 100), (2, 100)]).await;
}

#[tokio::test(start_paused = true)]
async fn repeated_trigger_replaces_the_running_child() {
    let machine = downloads(Duration::from_millis(10)).launch();
    let mut states = machine.state();
    next(&mut states).await;

    machine.dispatch(DownloadAction::Start(1)).unwrap();
    sleep(Duration::from_millis(15)).await;
    machine.dispatch(DownloadAction::Start(1)).unwrap();

    let mut seen = Vec::new();
    while seen.last() != Some(&100) {
        let downloads = next(&mut states).await;
        seen.push(downloads.items[&1]);
    }
    assert_eq!(seen, vec![0, 50, 0, 50, 100]);
}

#[tokio::test(start_paused = true)]
async fn other_actions_are_forwarded_to_children() {
    let machine = downloads(Duration::from_secs(60)).launch();
    let mut states = machine.state();
    next(&mut states).await;

    machine.dispatch(DownloadAction::Start(1)).unwrap();
    machine.dispatch(DownloadAction::Start(2)).unwrap();
    wait_for(&mut states, &[(1, 0), (2, 0)]).await;
    machine.dispatch(DownloadAction::BoostAll).unwrap();

    timeout(
        Duration::from_secs(1),
        wait_for(&mut states, &[(1, 100), (2, 100)]),
    )
    .await
    .expect("children were not boosted");
}

#[tokio::test(start_paused = true)]
async fn replaced_child_stops_while_still_observed() {
    let launched = Launched::default();
    let machine = downloads_tracked(Duration::from_secs(60), launched.clone()).launch();
    let mut states = machine.state();
    next(&mut states).await;

    machine.dispatch(DownloadAction::Start(1)).unwrap();
    wait_for(&mut states, &[(1, 0)]).await;
    let first = launched.lock()[0].clone();
    let mut first_states = first.state();

    machine.dispatch(DownloadAction::Start(1)).unwrap();
    timeout(Duration::from_secs(1), async {
        while first_states.next().await.is_some() {}
    })
    .await
    .expect("replaced child kept running");

    assert!(!first.is_running());
    let children: Vec<_> = launched.lock().clone();
    assert_eq!(children.len(), 2);
    assert!(children[1].is_running());
}

#[tokio::test]
async fn child_faults_fail_the_parent() {
    let machine = downloads(Duration::from_secs(60)).launch();
    let mut states = machine.state();
    next(&mut states).await;

    machine.dispatch(DownloadAction::Start(4)).unwrap();
    wait_for(&mut states, &[(4, 0)]).await;
    machine.dispatch(DownloadAction::FailAll).unwrap();

    let fault = loop {
        let item = timeout(Duration::from_secs(5), states.next()).await;
        match item.unwrap() {
            Some(Ok(_)) => continue,
            Some(Err(fault)) => break fault,
            None => panic!("stream ended without a fault"),
        }
    };
    match fault {
        FlowError::ChildStateMachine { source, .. } => {
            assert!(matches!(*source, FlowError::SideEffect { .. }));
        }
        other => panic!("unexpected fault {other:?}"),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Upload {
    Idle,
    Sending(u8),
    Done,
}

#[derive(Clone, Debug)]
enum UploadAction {
    Begin,
    Abort,
}

fn uploads(step: Duration) -> StateMachineFactory<Upload, UploadAction> {
    uploads_tracked(step, Launched::default())
}

fn uploads_tracked(
    step: Duration,
    launched: Launched,
) -> StateMachineFactory<Upload, UploadAction> {
    let children = progress_factory(step);
    let spec = StateMachineSpec::new()
        .in_state(
            |upload: &Upload| matches!(upload, Upload::Sending(_)),
            move |scope| {
                scope.on_enter_start_state_machine(
                    move |_: &Upload| {
                        let child = children.launch_from(Progress { id: 0, percent: 0 });
                        launched.lock().push(child.clone());
                        child
                    },
                    |_: &UploadAction| None,
                    |_: &Upload, progress: Progress| {
                        if progress.percent >= 100 {
                            ChangedState::Override(Upload::Done)
                        } else {
                            ChangedState::Override(Upload::Sending(progress.percent))
                        }
                    },
                )
            },
        )
        .in_any_state(|scope| {
            scope
                .on(
                    action_of!(UploadAction::Begin),
                    ExecutionPolicy::Ordered,
                    |_, _| async { Ok::<_, BoxError>(ChangedState::Override(Upload::Sending(0))) },
                )
                .on(
                    action_of!(UploadAction::Abort),
                    ExecutionPolicy::Ordered,
                    |_, _| async { Ok::<_, BoxError>(ChangedState::Override(Upload::Idle)) },
                )
        });
    StateMachineFactory::new(|| Upload::Idle, spec).unwrap()
}

#[tokio::test(start_paused = true)]
async fn entering_a_state_starts_a_child() {
    let machine = uploads(Duration::from_millis(10)).launch();
    let mut states = machine.state();
    assert_eq!(next(&mut states).await, Upload::Idle);

    machine.dispatch(UploadAction::Begin).unwrap();

    loop {
        if next(&mut states).await == Upload::Done {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn leaving_the_state_stops_the_child() {
    let machine = uploads(Duration::from_millis(10)).launch();
    let mut states = machine.state();
    next(&mut states).await;

    machine.dispatch(UploadAction::Begin).unwrap();
    sleep(Duration::from_millis(15)).await;
    assert_eq!(machine.current_state(), Some(Upload::Sending(50)));
    machine.dispatch(UploadAction::Abort).unwrap();

    sleep(Duration::from_millis(100)).await;
    assert_eq!(machine.current_state(), Some(Upload::Idle));
}

#[tokio::test(start_paused = true)]
async fn leaving_the_state_stops_an_observed_child() {
    let launched = Launched::default();
    let machine = uploads_tracked(Duration::from_secs(60), launched.clone()).launch();
    let mut states = machine.state();
    next(&mut states).await;

    machine.dispatch(UploadAction::Begin).unwrap();
    while launched.lock().is_empty() {
        next(&mut states).await;
    }
    let child = launched.lock()[0].clone();
    let mut child_states = child.state();

    machine.dispatch(UploadAction::Abort).unwrap();
    timeout(Duration::from_secs(1), async {
        while child_states.next().await.is_some() {}
    })
    .await
    .expect("child outlived its scope");

    assert!(!child.is_running());
    while next(&mut states).await != Upload::Idle {}
}
