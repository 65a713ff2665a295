//! Parallel downloads, one child machine per file.
//!
//! Starting a file that is already downloading restarts it.

use flowstate::action_of;
use flowstate::builder::StateMachineSpec;
use flowstate::checkpoint::SnapshotStateHolder;
use flowstate::core::{ChangedState, ExecutionPolicy};
use flowstate::error::BoxError;
use flowstate::machine::{MachineConfig, StateMachineFactory};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, PartialEq)]
struct Download {
    file: String,
    received: u32,
    size: u32,
}

#[derive(Clone, Debug)]
enum DownloadInput {
    Pause,
    Resume,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Dashboard {
    progress: BTreeMap<String, String>,
    paused: bool,
}

#[derive(Clone, Debug)]
enum Input {
    Start(String),
    Pause,
    Resume,
}

fn download_factory() -> Result<StateMachineFactory<Download, DownloadInput>, BoxError> {
    let spec = StateMachineSpec::new()
        .in_state(
            |download: &Download| download.received < download.size,
            |scope| {
                scope.collect_while_in_state(
                    |_: &Download| {
                        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(
                            Duration::from_millis(100),
                        ))
                    },
                    ExecutionPolicy::Ordered,
                    |_, _| async {
                        Ok::<_, BoxError>(ChangedState::mutate(|download: Download| Download {
                            received: (download.received + 256).min(download.size),
                            ..download
                        }))
                    },
                )
            },
        )
        .in_any_state(|scope| {
            scope
                .on_action_effect(
                    action_of!(DownloadInput::Pause),
                    ExecutionPolicy::Ordered,
                    |_, download| async move {
                        println!("pause requested for {}", download.file);
                        Ok::<_, BoxError>(())
                    },
                )
                .on_action_effect(
                    action_of!(DownloadInput::Resume),
                    ExecutionPolicy::Ordered,
                    |_, download| async move {
                        println!("resume requested for {}", download.file);
                        Ok::<_, BoxError>(())
                    },
                )
        });

    let factory = StateMachineFactory::new(
        || Download {
            file: String::new(),
            received: 0,
            size: 0,
        },
        spec,
    )?;
    Ok(factory.with_config(MachineConfig::default().with_name("download")))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let downloads = download_factory()?;
    let spec = StateMachineSpec::<Dashboard, Input>::new().in_any_state(move |scope| {
        scope
            .on_action_start_state_machine(
                action_of!(Input::Start(file) => file.clone()),
                move |file, _| {
                    downloads.launch_from(Download {
                        file,
                        received: 0,
                        size: 1024,
                    })
                },
                |input: &Input| match input {
                    Input::Pause => Some(DownloadInput::Pause),
                    Input::Resume => Some(DownloadInput::Resume),
                    Input::Start(_) => None,
                },
                |_, download: Download| {
                    ChangedState::mutate(move |mut dashboard: Dashboard| {
                        let line = format!("{}/{}", download.received, download.size);
                        dashboard.progress.insert(download.file.clone(), line);
                        dashboard
                    })
                },
            )
            .on(
                |input: &Input| match input {
                    Input::Pause => Some(true),
                    Input::Resume => Some(false),
                    Input::Start(_) => None,
                },
                ExecutionPolicy::Ordered,
                |paused, _| async move {
                    Ok::<_, BoxError>(ChangedState::mutate(move |dashboard: Dashboard| Dashboard {
                        paused,
                        ..dashboard
                    }))
                },
            )
    });

    let holder = SnapshotStateHolder::new(Dashboard::default);
    let machine = StateMachineFactory::new(Dashboard::default, spec)?
        .with_config(MachineConfig::default().with_name("dashboard"))
        .with_state_holder(holder)
        .launch();

    let mut states = machine.state();
    let printer = tokio::spawn(async move {
        while let Some(Ok(dashboard)) = states.next().await {
            println!("{:?}", dashboard.progress);
        }
    });

    machine.dispatch(Input::Start("a.bin".into()))?;
    machine.dispatch(Input::Start("b.bin".into()))?;
    tokio::time::sleep(Duration::from_millis(250)).await;
    machine.dispatch(Input::Pause)?;
    machine.dispatch(Input::Start("a.bin".into()))?;
    machine.dispatch(Input::Resume)?;
    tokio::time::sleep(Duration::from_millis(600)).await;

    machine.cancel();
    printer.await?;
    Ok(())
}
