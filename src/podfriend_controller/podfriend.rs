use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::{
    CustomResource, Resource,
    api::{Api, ListParams, Patch, PatchParams, ResourceExt},
    runtime::{
        controller::Action,
        events::{Event, EventType},
        wait::Condition,
    },
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::*;

use super::Context;
use crate::{Error, Result};

pub static PODFRIEND_MANAGER_NAME: &str = "podfriend-controller";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "operator.my.company",
    version = "v1",
    kind = "PodFriend",
    derive = "Default",
    namespaced,
    shortname = "pf",
    doc = "PodFriend tracks whether a Pod with a given name exists in the cluster",
    printcolumn = r#"{"name":"Friend","jsonPath":".spec.name","type":"string"}"#,
    printcolumn = r#"{"name":"Happy","jsonPath":".status.happy","type":"boolean"}"#,
    status = "PodFriendStatus"
)]
pub struct PodFriendSpec {
    /// Name of the Pod this PodFriend is looking for
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct PodFriendStatus {
    /// True while a Pod named `spec.name` exists somewhere in the cluster
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub happy: bool,
}

impl PodFriend {
    pub async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let ns = self.namespace().unwrap();
        let api_friend: Api<PodFriend> = Api::namespaced(ctx.client.clone(), &ns);
        let api_pods: Api<Pod> = Api::all(ctx.client.clone());

        // A failed Pod list degrades to "friend not found" instead of aborting
        let happy = match api_pods.list(&ListParams::default()).await {
            Ok(pods) => has_pod_named(&pods.items, &self.spec.name),
            Err(err) => {
                warn!("Unable to list pods: {err:?}");
                false
            }
        };
        if happy {
            info!(
                "Pod \"{}\" found for PodFriend \"{}\"",
                self.spec.name,
                self.name_any()
            );
        }
        let was_happy = self.status.as_ref().is_some_and(|status| status.happy);

        // With apply semantics an omitted `happy` is pruned from the status,
        // so a false value round-trips as an absent field
        let serverside = PatchParams::apply(PODFRIEND_MANAGER_NAME).force();
        let status = Patch::Apply(json!({
            "apiVersion": PodFriend::api_version(&()),
            "kind": "PodFriend",
            "status": PodFriendStatus { happy },
        }));
        api_friend
            .patch_status(&self.name_any(), &serverside, &status)
            .await
            .map_err(Error::KubeError)?;
        info!(
            "PodFriend \"{}\" happy status updated to {}",
            self.name_any(),
            happy
        );

        // Publish an event on transitions only, ignoring errors
        if happy != was_happy {
            let (reason, note) = if happy {
                (
                    "FriendFound",
                    format!(
                        "Found `{}` Pod for `{}` PodFriend",
                        self.spec.name,
                        self.name_any()
                    ),
                )
            } else {
                (
                    "FriendLost",
                    format!(
                        "No `{}` Pod left for `{}` PodFriend",
                        self.spec.name,
                        self.name_any()
                    ),
                )
            };
            let _ = ctx
                .recorder
                .publish(
                    &Event {
                        type_: EventType::Normal,
                        reason: reason.into(),
                        note: Some(note),
                        action: "Updated".into(),
                        secondary: None,
                    },
                    &self.object_ref(&()),
                )
                .await;
        }

        Ok(Action::await_change())
    }
}

/// Exact name equality over a listed set of Pods
pub fn has_pod_named(pods: &[Pod], name: &str) -> bool {
    pods.iter().any(|pod| pod.name_any() == name)
}

pub fn is_happy() -> impl Condition<PodFriend> {
    |obj: Option<&PodFriend>| {
        if let Some(friend) = obj
            && let Some(status) = &friend.status
        {
            return status.happy;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use kube::runtime::wait::Condition;

    fn pod_named(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("default".into()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[test]
    fn finds_pod_with_exact_name() {
        let pods = vec![pod_named("alice"), pod_named("bob")];
        assert!(has_pod_named(&pods, "alice"));
        assert!(has_pod_named(&pods, "bob"));
    }

    #[test]
    fn misses_when_no_pod_matches() {
        let pods = vec![pod_named("bob")];
        assert!(!has_pod_named(&pods, "alice"));
        assert!(!has_pod_named(&[], "alice"));
    }

    #[test]
    fn name_match_is_exact_not_prefix() {
        let pods = vec![pod_named("alice-1"), pod_named("malice")];
        assert!(!has_pod_named(&pods, "alice"));
    }

    #[test]
    fn happy_is_omitted_when_false() {
        let status = serde_json::to_value(PodFriendStatus { happy: false }).unwrap();
        assert_eq!(status, serde_json::json!({}));
        let status = serde_json::to_value(PodFriendStatus { happy: true }).unwrap();
        assert_eq!(status, serde_json::json!({"happy": true}));
    }

    #[test]
    fn absent_happy_decodes_as_false() {
        let status: PodFriendStatus = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!status.happy);
    }

    #[test]
    fn is_happy_requires_a_happy_status() {
        let mut friend = PodFriend::new("demo", PodFriendSpec { name: "alice".into() });
        assert!(!is_happy().matches_object(Some(&friend)));
        friend.status = Some(PodFriendStatus { happy: false });
        assert!(!is_happy().matches_object(Some(&friend)));
        friend.status = Some(PodFriendStatus { happy: true });
        assert!(is_happy().matches_object(Some(&friend)));
        assert!(!is_happy().matches_object(None));
    }
}
