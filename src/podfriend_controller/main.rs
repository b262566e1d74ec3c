use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, ListParams, ResourceExt},
    client::Client,
    runtime::{
        WatchStreamExt,
        controller::{Action, Controller},
        events::{Recorder, Reporter},
        reflector, watcher,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

use super::{PodFriend, map_pod_to_friends};
use crate::{Error, Result};

#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Event recorder
    pub recorder: Recorder,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    #[serde(deserialize_with = "from_ts")]
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "podfriend-controller".into(),
        }
    }
}
impl Diagnostics {
    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
}

impl State {
    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub async fn to_context(&self, client: Client) -> Arc<Context> {
        Arc::new(Context {
            client: client.clone(),
            recorder: self.diagnostics.read().await.recorder(client),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

async fn reconcile(friend: Arc<PodFriend>, ctx: Arc<Context>) -> Result<Action> {
    ctx.diagnostics.write().await.last_event = Utc::now();
    let ns = friend.namespace().unwrap(); // PodFriend is namespace scoped
    let api_friend: Api<PodFriend> = Api::namespaced(ctx.client.clone(), &ns);

    info!("Reconciling PodFriend \"{}\" in {}", friend.name_any(), ns);
    // The object may be gone between enqueue and processing
    match api_friend
        .get_opt(&friend.name_any())
        .await
        .map_err(Error::KubeError)?
    {
        Some(friend) => friend.reconcile(ctx.clone()).await,
        None => {
            debug!("PodFriend \"{}\" is gone, nothing to reconcile", friend.name_any());
            Ok(Action::await_change())
        }
    }
}

fn error_policy(_: Arc<PodFriend>, error: &Error, _: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    Action::requeue(Duration::from_secs(5 * 60))
}

pub async fn run(state: State) {
    let client = Client::try_default()
        .await
        .expect("Expected a valid KUBECONFIG environment variable");
    let friends = Api::<PodFriend>::all(client.clone());
    if let Err(e) = friends.list(&ListParams::default().limit(1)).await {
        error!("PodFriend CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin gencrd && kubectl apply -f podfriend.yaml");
        std::process::exit(1);
    }
    let pods = Api::<Pod>::all(client.clone());

    // The Pod event mapper filters a cached view of all PodFriend objects.
    // Watch errors only log; the mapper keeps serving the last synced state.
    let (reader, writer) = reflector::store::<PodFriend>();
    let cache = watcher(friends.clone(), watcher::Config::default().any_semantic())
        .default_backoff()
        .reflect(writer)
        .touched_objects()
        .for_each(async |friend| {
            if let Err(err) = friend {
                warn!("PodFriend cache watch failed: {err:?}");
            }
        });
    tokio::spawn(cache);

    Controller::new(friends, watcher::Config::default().any_semantic())
        .watches(pods, watcher::Config::default(), move |pod| {
            map_pod_to_friends(&reader.state(), &pod)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client).await)
        .filter_map(async |x| std::result::Result::ok(x))
        .for_each(async |_| ())
        .await;
}
