use std::sync::Arc;

use clap::Parser;
use futures::stream::StreamExt;
use stackable_operator::{
    YamlSchema,
    cli::{Command, ProductOperatorRun},
    k8s_openapi::api::{
        apps::v1::{Deployment, StatefulSet},
        core::v1::Service,
        networking::v1::Ingress,
    },
    kube::{
        CustomResourceExt,
        core::DeserializeGuard,
        runtime::{
            Controller,
            events::{Recorder, Reporter},
            watcher,
        },
    },
    logging::controller::report_controller_reconciled,
    shared::yaml::SerializeOptions,
    time::Duration,
};

use crate::{controller::FULL_CONTROLLER_NAME, crd::AxonOpsCassandra};

mod config;
mod controller;
mod crd;
mod event;
mod operations;
mod render;
mod store;
#[cfg(test)]
mod test_utils;

pub const OPERATOR_NAME: &str = "axonops.com";

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Parser)]
#[clap(about, author)]
struct Opts {
    #[clap(subcommand)]
    cmd: Command<AxonOpsRun>,
}

#[derive(clap::Args)]
struct AxonOpsRun {
    /// How long to wait before reconciling an unchanged AxonOpsCassandra again
    #[arg(long, env = "RESYNC_INTERVAL", default_value = "10m")]
    resync_interval: Duration,

    /// How long to wait before retrying a failed reconciliation
    #[arg(long, env = "ERROR_REQUEUE_INTERVAL", default_value = "10s")]
    error_requeue_interval: Duration,

    #[clap(flatten)]
    common: ProductOperatorRun,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    match opts.cmd {
        Command::Crd => AxonOpsCassandra::crd()
            .print_yaml_schema(built_info::PKG_VERSION, SerializeOptions::default())?,
        Command::Run(AxonOpsRun {
            resync_interval,
            error_requeue_interval,
            common:
                ProductOperatorRun {
                    product_config: _,
                    watch_namespace,
                    tracing_target,
                    cluster_info_opts,
                },
        }) => {
            stackable_operator::logging::initialize_logging(
                "AXONOPS_OPERATOR_LOG",
                "axonops-operator",
                tracing_target,
            );
            tracing::info!(
                built_info.pkg_version = built_info::PKG_VERSION,
                built_info.git_version = built_info::GIT_VERSION,
                built_info.target = built_info::TARGET,
                built_info.built_time_utc = built_info::BUILT_TIME_UTC,
                built_info.rustc_version = built_info::RUSTC_VERSION,
                "Starting {description}",
                description = built_info::PKG_DESCRIPTION
            );

            let client = stackable_operator::client::initialize_operator(
                Some(OPERATOR_NAME.to_string()),
                &cluster_info_opts,
            )
            .await?;

            let event_recorder = Recorder::new(client.as_kube_client(), Reporter {
                controller: FULL_CONTROLLER_NAME.to_string(),
                instance: None,
            });
            let reporting_recorder = Arc::new(event_recorder.clone());

            Controller::new(
                watch_namespace.get_api::<DeserializeGuard<AxonOpsCassandra>>(&client),
                watcher::Config::default(),
            )
            .owns(
                watch_namespace.get_api::<StatefulSet>(&client),
                watcher::Config::default(),
            )
            .owns(
                watch_namespace.get_api::<Deployment>(&client),
                watcher::Config::default(),
            )
            .owns(
                watch_namespace.get_api::<Service>(&client),
                watcher::Config::default(),
            )
            .owns(
                watch_namespace.get_api::<Ingress>(&client),
                watcher::Config::default(),
            )
            .shutdown_on_signal()
            .run(
                controller::reconcile_axonops,
                controller::error_policy,
                Arc::new(controller::Ctx {
                    client: client.clone(),
                    recorder: event_recorder,
                    resync_interval: *resync_interval,
                    error_requeue_interval: *error_requeue_interval,
                }),
            )
            // We can let the reporting happen in the background
            .for_each_concurrent(
                16, // concurrency limit
                move |result| {
                    // The event_recorder needs to be shared across all invocations, so that
                    // events are correctly aggregated
                    let reporting_recorder = reporting_recorder.clone();
                    async move {
                        report_controller_reconciled(
                            &reporting_recorder,
                            FULL_CONTROLLER_NAME,
                            &result,
                        )
                        .await;
                    }
                },
            )
            .await;
        }
    }

    Ok(())
}
