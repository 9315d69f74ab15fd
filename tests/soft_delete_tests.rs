mod common;

use cathaybot_db::{Crud, Filter, ListOptions, Visibility};
use common::{group, new_group, new_user, seed_users, setup, user, users};
use sea_orm::Set;

async fn visible_ids(crud: &Crud<user::Entity>) -> Vec<i64> {
    crud.get_multi(&Filter::new(), &ListOptions::default())
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect()
}

#[tokio::test]
async fn soft_delete_round_trip() {
    let crud = users().await;
    let alice = crud.create(new_user("alice", "member", 30)).await.unwrap();

    assert!(crud.soft_delete(alice.id).await.unwrap());
    assert!(!visible_ids(&crud).await.contains(&alice.id));
    assert!(crud.get(alice.id).await.unwrap().is_none());

    let deleted = crud.include_deleted().get(alice.id).await.unwrap().unwrap();
    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());

    assert_eq!(crud.restore(alice.id).await.unwrap(), 1);
    assert!(visible_ids(&crud).await.contains(&alice.id));

    let restored = crud.get(alice.id).await.unwrap().unwrap();
    assert!(!restored.is_deleted);
    assert!(restored.deleted_at.is_none());
}

#[tokio::test]
async fn counts_by_visibility() {
    let crud = users().await;
    let seeded = seed_users(&crud, 10).await;
    for user in &seeded[..3] {
        crud.soft_delete(user.id).await.unwrap();
    }

    assert_eq!(crud.count(&Filter::new()).await.unwrap(), 7);
    assert_eq!(crud.include_deleted().count(&Filter::new()).await.unwrap(), 10);
    assert_eq!(crud.only_deleted().count(&Filter::new()).await.unwrap(), 3);
    assert_eq!(crud.only_deleted().visibility(), Visibility::OnlyDeleted);
}

#[tokio::test]
async fn second_soft_delete_is_a_no_op() {
    let crud = users().await;
    let alice = crud.create(new_user("alice", "member", 30)).await.unwrap();

    assert!(crud.soft_delete(alice.id).await.unwrap());
    let first = crud.include_deleted().get(alice.id).await.unwrap().unwrap();

    assert!(!crud.soft_delete(alice.id).await.unwrap());
    let second = crud.include_deleted().get(alice.id).await.unwrap().unwrap();
    assert_eq!(first.deleted_at, second.deleted_at);
}

#[tokio::test]
async fn soft_delete_missing_is_not_found() {
    let crud = users().await;
    assert!(crud.soft_delete(404i64).await.unwrap_err().is_not_found());
    assert!(crud.restore(404i64).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn restoring_an_active_row_affects_nothing() {
    let crud = users().await;
    let alice = crud.create(new_user("alice", "member", 30)).await.unwrap();
    assert_eq!(crud.restore(alice.id).await.unwrap(), 0);
    assert_eq!(crud.get(alice.id).await.unwrap().unwrap(), alice);
}

#[tokio::test]
async fn hard_delete_is_irreversible() {
    let crud = users().await;
    let alice = crud.create(new_user("alice", "member", 30)).await.unwrap();
    crud.soft_delete(alice.id).await.unwrap();

    assert!(crud.hard_delete(alice.id).await.unwrap());
    assert!(crud.get(alice.id).await.unwrap().is_none());
    assert!(crud.include_deleted().get(alice.id).await.unwrap().is_none());
    assert!(crud.only_deleted().get(alice.id).await.unwrap().is_none());
    assert!(crud.restore(alice.id).await.unwrap_err().is_not_found());
    assert!(!crud.hard_delete(alice.id).await.unwrap());
}

#[tokio::test]
async fn deleted_rows_cannot_be_updated_through_default_scope() {
    let crud = users().await;
    let alice = crud.create(new_user("alice", "member", 30)).await.unwrap();
    crud.soft_delete(alice.id).await.unwrap();

    let changes = user::ActiveModel {
        age: Set(31),
        ..Default::default()
    };
    assert!(crud.update(alice.id, changes.clone()).await.unwrap_err().is_not_found());

    let updated = crud.include_deleted().update(alice.id, changes).await.unwrap();
    assert_eq!(updated.age, 31);
    assert!(updated.is_deleted);
}

#[tokio::test]
async fn batch_transitions_by_filter() {
    let crud = users().await;
    seed_users(&crud, 8).await;

    let young = Filter::new().lt("age", 24);
    assert_eq!(crud.soft_delete_by(&young).await.unwrap(), 4);
    assert_eq!(crud.soft_delete_by(&young).await.unwrap(), 0);
    assert_eq!(crud.count(&Filter::new()).await.unwrap(), 4);

    assert_eq!(crud.restore_by(&Filter::new().eq("age", 20)).await.unwrap(), 1);
    assert_eq!(crud.only_deleted().count(&Filter::new()).await.unwrap(), 3);

    assert_eq!(crud.hard_delete_by(&young).await.unwrap(), 4);
    assert_eq!(crud.include_deleted().count(&Filter::new()).await.unwrap(), 4);
}

#[tokio::test]
async fn default_delete_skips_soft_deleted_rows() {
    let crud = users().await;
    let alice = crud.create(new_user("alice", "member", 30)).await.unwrap();
    crud.soft_delete(alice.id).await.unwrap();

    assert!(!crud.delete(alice.id).await.unwrap());
    assert!(crud.include_deleted().delete(alice.id).await.unwrap());
}

#[tokio::test]
async fn entities_without_soft_delete_ignore_visibility() {
    let groups = Crud::<group::Entity>::new(setup().await);
    groups.create(new_group(1, "rust")).await.unwrap();

    assert_eq!(groups.count(&Filter::new()).await.unwrap(), 1);
    assert_eq!(groups.only_deleted().count(&Filter::new()).await.unwrap(), 1);
    assert!(groups.soft_delete(1i64).await.unwrap_err().is_validation());
    assert!(groups.restore(1i64).await.unwrap_err().is_validation());
    assert!(groups.hard_delete(1i64).await.unwrap());
}

#[tokio::test]
async fn update_cannot_bypass_deletion_transitions() {
    let crud = users().await;
    let alice = crud.create(new_user("alice", "member", 30)).await.unwrap();

    let flag_only = user::ActiveModel {
        is_deleted: Set(true),
        ..Default::default()
    };
    assert!(crud.update(alice.id, flag_only).await.unwrap_err().is_validation());
    let current = crud.get(alice.id).await.unwrap().unwrap();
    assert!(!current.is_deleted);
    assert!(current.deleted_at.is_none());

    crud.soft_delete(alice.id).await.unwrap();
    let revive = user::ActiveModel {
        is_deleted: Set(false),
        ..Default::default()
    };
    let err = crud
        .include_deleted()
        .update(alice.id, revive)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let clear_time = user::ActiveModel {
        deleted_at: Set(None),
        ..Default::default()
    };
    assert!(
        crud.include_deleted()
            .update(alice.id, clear_time)
            .await
            .unwrap_err()
            .is_validation()
    );

    let still_deleted = crud.include_deleted().get(alice.id).await.unwrap().unwrap();
    assert!(still_deleted.is_deleted);
    assert!(still_deleted.deleted_at.is_some());
}

#[tokio::test]
async fn bulk_update_rejects_deletion_flags() {
    let crud = users().await;
    let seeded = seed_users(&crud, 2).await;

    let changes = vec![
        (
            seeded[0].id,
            user::ActiveModel {
                age: Set(50),
                ..Default::default()
            },
        ),
        (
            seeded[1].id,
            user::ActiveModel {
                is_deleted: Set(true),
                ..Default::default()
            },
        ),
    ];
    assert!(crud.bulk_update(changes).await.unwrap_err().is_validation());
    assert_eq!(crud.get(seeded[0].id).await.unwrap().unwrap().age, 20);
    assert_eq!(crud.count(&Filter::new()).await.unwrap(), 2);
}
