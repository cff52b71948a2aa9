//! Subtree migration tests: path rewriting, relation pruning, root-group
//! attribution, concurrency and atomicity.

mod common;

use canopy::error::Error;
use canopy::store::Store;
use canopy::types::{Member, RegistryResourceKind};
use common::TestStore;

#[test]
fn test_migrate_child_to_root_scenario() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let w = t.workspace("w", &b);

    let sa = t.store.create_service_account(&b.metadata.id, "sa").unwrap();
    let runner = t.store.create_runner(&a.metadata.id, "runner").unwrap();
    // This assignment breaks ancestry, which the store refuses, so write the row directly.
    t.seed_runner_assignment(&sa.id, &runner.id);

    let moved = t.store.migrate_group(&b, None).unwrap();

    assert_eq!(moved.full_path, "b");
    assert_eq!(moved.parent_id, None);
    assert_eq!(moved.metadata.trn, "trn:group:b");
    assert_eq!(moved.metadata.version, b.metadata.version + 1);
    assert_eq!(t.workspace_path(&w), "b/w");
    assert!(
        t.store
            .list_runner_service_accounts(&runner.id)
            .unwrap()
            .is_empty()
    );

    assert!(t.store.get_group_by_trn("trn:group:a/b").unwrap().is_none());
    assert_eq!(
        t.store.get_group_by_trn("trn:group:b").unwrap().unwrap().metadata.id,
        b.metadata.id
    );
    assert_eq!(
        t.store
            .get_namespace_by_path("b/w")
            .unwrap()
            .unwrap()
            .workspace_id(),
        Some(w.metadata.id.as_str())
    );
}

#[test]
fn test_migrate_rewrites_descendants_only() {
    let t = TestStore::new();
    let x = t.group("x", None);
    let y = t.group("y", Some(&x));
    let z = t.group("z", Some(&y));
    let deep = t.workspace("deep", &z);
    let lookalike = t.group("yy", Some(&x));
    let lookalike_ws = t.workspace("w", &lookalike);
    let q = t.group("q", None);

    let moved = t.store.migrate_group(&y, Some(&q)).unwrap();

    assert_eq!(moved.full_path, "q/y");
    assert_eq!(moved.parent_id.as_deref(), Some(q.metadata.id.as_str()));
    assert_eq!(t.path_of(&z), "q/y/z");
    assert_eq!(t.workspace_path(&deep), "q/y/z/deep");

    assert_eq!(t.path_of(&x), "x");
    assert_eq!(t.path_of(&lookalike), "x/yy");
    assert_eq!(t.workspace_path(&lookalike_ws), "x/yy/w");
    assert_eq!(t.path_of(&q), "q");

    // Descendants keep their own parent links.
    assert_eq!(
        t.reload(&z).parent_id.as_deref(),
        Some(y.metadata.id.as_str())
    );
}

#[test]
fn test_migrate_keeps_path_consistency() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let c = t.group("c", Some(&b));
    let d = t.group("d", Some(&c));
    let target = t.group("target", None);

    t.store.migrate_group(&c, Some(&target)).unwrap();

    for group in [&a, &b, &c, &d, &target] {
        let current = t.reload(group);
        let expected = match &current.parent_id {
            Some(parent_id) => {
                let parent = t.store.get_group_by_id(parent_id).unwrap().unwrap();
                format!("{}/{}", parent.full_path, current.name)
            }
            None => current.name.clone(),
        };
        assert_eq!(current.full_path, expected);
    }
}

#[test]
fn test_migrate_refreshes_root_group_attribution() {
    let t = TestStore::new();
    let x = t.group("x", None);
    let y = t.group("y", Some(&x));
    let z = t.group("z", Some(&y));
    let q = t.group("q", None);

    let provider = t
        .store
        .create_registry_resource(RegistryResourceKind::TerraformProvider, &z.metadata.id, "aws")
        .unwrap();
    let module = t
        .store
        .create_registry_resource(RegistryResourceKind::TerraformModule, &y.metadata.id, "vpc")
        .unwrap();
    let mirror = t
        .store
        .create_registry_resource(RegistryResourceKind::ProviderMirror, &z.metadata.id, "mirror")
        .unwrap();
    let outside = t
        .store
        .create_registry_resource(RegistryResourceKind::TerraformModule, &x.metadata.id, "dns")
        .unwrap();
    assert_eq!(provider.root_group_id, x.metadata.id);

    let y = t.store.migrate_group(&y, None).unwrap();
    for (kind, id) in [
        (RegistryResourceKind::TerraformProvider, &provider.id),
        (RegistryResourceKind::TerraformModule, &module.id),
        (RegistryResourceKind::ProviderMirror, &mirror.id),
    ] {
        let resource = t.store.get_registry_resource(kind, id).unwrap().unwrap();
        assert_eq!(resource.root_group_id, y.metadata.id);
    }

    t.store.migrate_group(&y, Some(&q)).unwrap();
    for (kind, id) in [
        (RegistryResourceKind::TerraformProvider, &provider.id),
        (RegistryResourceKind::TerraformModule, &module.id),
        (RegistryResourceKind::ProviderMirror, &mirror.id),
    ] {
        let resource = t.store.get_registry_resource(kind, id).unwrap().unwrap();
        assert_eq!(resource.root_group_id, q.metadata.id);
    }

    let outside = t
        .store
        .get_registry_resource(RegistryResourceKind::TerraformModule, &outside.id)
        .unwrap()
        .unwrap();
    assert_eq!(outside.root_group_id, x.metadata.id);
}

#[test]
fn test_migrate_prunes_only_invalidated_relations() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let c = t.group("c", Some(&b));
    let w = t.workspace("w", &c);
    let w2 = t.workspace("w2", &c);

    // Managed identities
    let mi_a = t.store.create_managed_identity(&a.metadata.id, "mi-a").unwrap();
    let mi_b = t.store.create_managed_identity(&b.metadata.id, "mi-b").unwrap();
    t.store
        .assign_managed_identity_to_workspace(&mi_a.id, &w.metadata.id)
        .unwrap();
    t.store
        .assign_managed_identity_to_workspace(&mi_b.id, &w.metadata.id)
        .unwrap();

    // VCS provider links
    let vp_a = t.store.create_vcs_provider(&a.metadata.id, "vp-a").unwrap();
    let vp_c = t.store.create_vcs_provider(&c.metadata.id, "vp-c").unwrap();
    t.store
        .link_workspace_to_vcs_provider(&w.metadata.id, &vp_a.id, "org/infra")
        .unwrap();
    t.store
        .link_workspace_to_vcs_provider(&w2.metadata.id, &vp_c.id, "org/app")
        .unwrap();

    // Service accounts: memberships and runner assignments
    let sa_a = t.store.create_service_account(&a.metadata.id, "sa-a").unwrap();
    let sa_b = t.store.create_service_account(&b.metadata.id, "sa-b").unwrap();
    let runner = t.store.create_runner(&c.metadata.id, "runner").unwrap();
    t.store
        .assign_service_account_to_runner(&sa_a.id, &runner.id)
        .unwrap();
    t.store
        .assign_service_account_to_runner(&sa_b.id, &runner.id)
        .unwrap();
    for member in [
        Member::ServiceAccount(sa_a.id.clone()),
        Member::ServiceAccount(sa_b.id.clone()),
        Member::User("user-1".to_string()),
        Member::Team("team-1".to_string()),
    ] {
        t.store
            .add_namespace_membership("a/b/c", &member, "deployer")
            .unwrap();
    }

    t.store.migrate_group(&b, None).unwrap();
    assert_eq!(t.workspace_path(&w), "b/c/w");

    assert_eq!(
        t.store.list_workspace_managed_identities(&w.metadata.id).unwrap(),
        vec![mi_b.id.clone()]
    );

    assert!(
        t.store
            .get_workspace_vcs_provider_link(&w.metadata.id)
            .unwrap()
            .is_none()
    );
    assert_eq!(
        t.store
            .get_workspace_vcs_provider_link(&w2.metadata.id)
            .unwrap()
            .unwrap()
            .provider_id,
        vp_c.id
    );

    assert_eq!(
        t.store.list_runner_service_accounts(&runner.id).unwrap(),
        vec![sa_b.id.clone()]
    );

    let members: Vec<Member> = t
        .store
        .list_namespace_memberships("b/c")
        .unwrap()
        .into_iter()
        .map(|m| m.member)
        .collect();
    assert_eq!(members.len(), 3);
    assert!(members.contains(&Member::ServiceAccount(sa_b.id.clone())));
    assert!(members.contains(&Member::User("user-1".to_string())));
    assert!(members.contains(&Member::Team("team-1".to_string())));
    assert!(!members.contains(&Member::ServiceAccount(sa_a.id.clone())));
}

#[test]
fn test_migrate_under_new_ancestor_keeps_relations_within_subtree() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let w = t.workspace("w", &b);
    let q = t.group("q", None);

    let mi = t.store.create_managed_identity(&b.metadata.id, "mi").unwrap();
    t.store
        .assign_managed_identity_to_workspace(&mi.id, &w.metadata.id)
        .unwrap();

    t.store.migrate_group(&b, Some(&q)).unwrap();

    assert_eq!(t.workspace_path(&w), "q/b/w");
    assert_eq!(
        t.store.list_workspace_managed_identities(&w.metadata.id).unwrap(),
        vec![mi.id]
    );
}

#[test]
fn test_migrate_stale_version_changes_nothing() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let w = t.workspace("w", &b);

    let mut fresh = b.clone();
    fresh.description = "touched".to_string();
    let fresh = t.store.update_group(&fresh).unwrap();
    assert_eq!(fresh.metadata.version, b.metadata.version + 1);

    let err = t.store.migrate_group(&b, None).unwrap_err();
    assert!(matches!(err, Error::OptimisticLock));

    let current = t.reload(&b);
    assert_eq!(current.full_path, "a/b");
    assert_eq!(current.metadata.version, fresh.metadata.version);
    assert_eq!(t.workspace_path(&w), "a/b/w");
}

#[test]
fn test_migrate_deleted_group_is_optimistic_lock() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    t.store.delete_group(&b).unwrap();

    let err = t.store.migrate_group(&b, None).unwrap_err();
    assert!(matches!(err, Error::OptimisticLock));
}

#[test]
fn test_migrate_rejects_cycles() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let c = t.group("c", Some(&b));

    let err = t.store.migrate_group(&b, Some(&b)).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = t.store.migrate_group(&b, Some(&c)).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = t.store.migrate_group(&a, Some(&c)).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    assert_eq!(t.path_of(&b), "a/b");
    assert_eq!(t.path_of(&c), "a/b/c");
    assert_eq!(t.reload(&b).metadata.version, b.metadata.version);
}

#[test]
fn test_migrate_path_collision_conflicts() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let _top_b = t.group("b", None);
    let q = t.group("q", None);
    let _ws = t.workspace("b", &q);

    let err = t.store.migrate_group(&b, None).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = t.store.migrate_group(&b, Some(&q)).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    assert_eq!(t.path_of(&b), "a/b");
}

#[test]
fn test_migrate_to_missing_parent_conflicts() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let gone = t.group("gone", None);
    t.store.delete_group(&gone).unwrap();

    let err = t.store.migrate_group(&b, Some(&gone)).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn test_migrate_to_current_parent_bumps_version() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));

    let moved = t.store.migrate_group(&b, Some(&a)).unwrap();

    assert_eq!(moved.full_path, "a/b");
    assert_eq!(moved.metadata.version, b.metadata.version + 1);
}

#[test]
fn test_migrate_respects_depth_limit() {
    let t = TestStore::with_max_group_depth(3);
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let _c = t.group("c", Some(&b));
    let x = t.group("x", None);
    let y = t.group("y", Some(&x));

    let err = t.store.migrate_group(&b, Some(&y)).unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
    assert_eq!(t.path_of(&b), "a/b");

    let moved = t.store.migrate_group(&b, Some(&x)).unwrap();
    assert_eq!(moved.full_path, "x/b");
}

#[test]
fn test_migrate_failure_rolls_back_everything() {
    let t = TestStore::new();
    let a = t.group("a", None);
    let b = t.group("b", Some(&a));
    let w = t.workspace("w", &b);

    let sa = t.store.create_service_account(&b.metadata.id, "sa").unwrap();
    let runner = t.store.create_runner(&a.metadata.id, "runner").unwrap();
    t.seed_runner_assignment(&sa.id, &runner.id);
    let provider = t
        .store
        .create_registry_resource(RegistryResourceKind::TerraformProvider, &b.metadata.id, "aws")
        .unwrap();

    // Fails the last step, after paths, the group row and relations were written.
    t.store
        .connection()
        .execute_batch(
            "CREATE TRIGGER fail_reattribution BEFORE UPDATE OF root_group_id ON terraform_providers
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        )
        .unwrap();

    assert!(t.store.migrate_group(&b, None).is_err());

    let current = t.reload(&b);
    assert_eq!(current.full_path, "a/b");
    assert_eq!(current.parent_id.as_deref(), Some(a.metadata.id.as_str()));
    assert_eq!(current.metadata.version, b.metadata.version);
    assert_eq!(t.workspace_path(&w), "a/b/w");
    assert!(t.store.get_namespace_by_path("b").unwrap().is_none());
    assert_eq!(
        t.store.list_runner_service_accounts(&runner.id).unwrap(),
        vec![sa.id.clone()]
    );
    assert_eq!(
        t.store
            .get_registry_resource(RegistryResourceKind::TerraformProvider, &provider.id)
            .unwrap()
            .unwrap()
            .root_group_id,
        a.metadata.id
    );

    t.store
        .connection()
        .execute_batch("DROP TRIGGER fail_reattribution;")
        .unwrap();
    let moved = t.store.migrate_group(&b, None).unwrap();
    assert_eq!(moved.full_path, "b");
}
