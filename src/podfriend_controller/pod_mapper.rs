use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::{api::ResourceExt, runtime::reflector::ObjectRef};
use tracing::*;

use super::PodFriend;

/// Translate a Pod change into reconcile requests for every PodFriend whose
/// `spec.name` equals the Pod's name. `friends` is a snapshot of the cached
/// PodFriend objects; before the cache first syncs it is empty and the Pod
/// change maps to nothing.
pub fn map_pod_to_friends(friends: &[Arc<PodFriend>], pod: &Pod) -> Vec<ObjectRef<PodFriend>> {
    let pod_name = pod.name_any();
    let requests: Vec<ObjectRef<PodFriend>> = friends
        .iter()
        .filter(|friend| friend.spec.name == pod_name)
        .map(|friend| ObjectRef::from_obj(friend.as_ref()))
        .collect();
    if !requests.is_empty() {
        info!(
            "Pod \"{}\" is wanted by {} PodFriend(s)",
            pod_name,
            requests.len()
        );
    }
    requests
}
