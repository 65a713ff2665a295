//! Counter with a debounced autosave.
//!
//! Run with `RUST_LOG=debug cargo run --example counter` to see the
//! runtime's log records.

use flowstate::action_of;
use flowstate::builder::StateMachineSpec;
use flowstate::core::{ChangedState, ExecutionPolicy};
use flowstate::error::BoxError;
use flowstate::logger::LogLevel;
use flowstate::machine::{MachineConfig, StateMachineFactory};
use futures::StreamExt;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, PartialEq)]
struct Counter {
    value: i64,
    saved: Option<i64>,
}

#[derive(Clone, Debug)]
enum Input {
    Add(i64),
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let spec = StateMachineSpec::<Counter, Input>::new()
        .in_any_state(|scope| {
            scope
                .on(
                    action_of!(Input::Add(amount) => *amount),
                    ExecutionPolicy::Ordered,
                    |amount, _| async move {
                        Ok::<_, BoxError>(ChangedState::mutate(move |counter: Counter| Counter {
                            value: counter.value + amount,
                            ..counter
                        }))
                    },
                )
                .on(
                    action_of!(Input::Reset),
                    ExecutionPolicy::Ordered,
                    |_, _| async {
                        Ok::<_, BoxError>(ChangedState::mutate(|counter: Counter| Counter {
                            value: 0,
                            ..counter
                        }))
                    },
                )
        })
        .in_state(
            |counter| counter.saved != Some(counter.value),
            |scope| {
                // Restarts on every change, so only a quiet counter is saved.
                scope.until_identity_changes(
                    |counter| counter.value,
                    |scope| {
                        scope.on_enter(|counter: Counter| async move {
                            tokio::time::sleep(Duration::from_millis(300)).await;
                            println!("saved {}", counter.value);
                            Ok::<_, BoxError>(ChangedState::mutate(move |current: Counter| Counter {
                                saved: Some(counter.value),
                                ..current
                            }))
                        })
                    },
                )
            },
        );

    let config = MachineConfig::default()
        .with_name("counter")
        .with_min_log_level(LogLevel::Debug);
    let initial = Counter {
        value: 0,
        saved: Some(0),
    };
    let machine = StateMachineFactory::new(move || initial.clone(), spec)?
        .with_config(config)
        .launch();

    let mut states = machine.state();
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            match state {
                Ok(counter) => println!("{counter:?}"),
                Err(error) => eprintln!("counter failed: {error}"),
            }
        }
    });

    for amount in [1, 2, 3] {
        machine.dispatch(Input::Add(amount))?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    machine.dispatch(Input::Reset)?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    machine.cancel();
    printer.await?;
    Ok(())
}
