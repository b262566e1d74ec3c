use kube::CustomResourceExt;
use operator::podfriend_controller::PodFriend;

#[test]
fn podfriend_crd_shape() {
    let crd = PodFriend::crd();
    assert_eq!(crd.spec.group, "operator.my.company");
    assert_eq!(crd.spec.names.kind, "PodFriend");
    assert_eq!(crd.spec.names.plural, "podfriends");
    assert_eq!(crd.spec.scope, "Namespaced");

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1");
    // Status is a subresource so the reconciler's writes are versioned apart from spec
    assert!(
        version
            .subresources
            .as_ref()
            .and_then(|sub| sub.status.as_ref())
            .is_some()
    );
}
