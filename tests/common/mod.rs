#![allow(dead_code)]

use cathaybot_db::config::DatabaseConfig;
use cathaybot_db::{Crud, db, entity};
use sea_orm::{DatabaseConnection, Set};

/// 带时间戳和软删除字段的用户表
pub mod user {
    use cathaybot_db::{Record, SoftDeleteColumns, Timestamps};
    use sea_orm::ActiveValue;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub username: String,
        pub email: Option<String>,
        pub role: String,
        pub age: i32,
        pub score: i64,
        pub is_active: bool,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
        pub is_deleted: bool,
        pub deleted_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl Record for Entity {
        fn id_column() -> Column {
            Column::Id
        }

        fn required_columns() -> Vec<Column> {
            vec![Column::Username, Column::Role, Column::Age]
        }

        fn timestamp_columns() -> Option<Timestamps<Column>> {
            Some(Timestamps {
                created_at: Column::CreatedAt,
                updated_at: Column::UpdatedAt,
            })
        }

        fn soft_delete_columns() -> Option<SoftDeleteColumns<Column>> {
            Some(SoftDeleteColumns {
                deleted_flag: Column::IsDeleted,
                deleted_at: Column::DeletedAt,
            })
        }

        fn validate(model: &ActiveModel) -> Result<(), String> {
            match &model.username {
                ActiveValue::Set(name) | ActiveValue::Unchanged(name) if name.trim().is_empty() => {
                    Err("username must not be empty".to_string())
                }
                _ => Ok(()),
            }
        }
    }
}

/// 手动指定主键、没有软删除字段的群组表
pub mod group {
    use cathaybot_db::Record;
    use sea_orm::ActiveValue;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "groups")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub name: String,
        pub member_count: i32,
        pub is_public: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl Record for Entity {
        fn id_column() -> Column {
            Column::Id
        }

        fn required_columns() -> Vec<Column> {
            vec![Column::Name]
        }

        fn validate(model: &ActiveModel) -> Result<(), String> {
            match model.member_count {
                ActiveValue::Set(count) | ActiveValue::Unchanged(count) if count < 0 => {
                    Err("member_count must not be negative".to_string())
                }
                _ => Ok(()),
            }
        }
    }
}

pub async fn setup() -> DatabaseConnection {
    let db = db::connect(&DatabaseConfig::in_memory()).await.unwrap();
    entity::create_table(&db, user::Entity).await.unwrap();
    entity::create_table(&db, group::Entity).await.unwrap();
    db
}

pub async fn users() -> Crud<user::Entity> {
    Crud::new(setup().await)
}

pub fn new_user(username: &str, role: &str, age: i32) -> user::ActiveModel {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(Some(format!("{username}@example.com"))),
        role: Set(role.to_string()),
        age: Set(age),
        score: Set(0),
        is_active: Set(true),
        ..Default::default()
    }
}

pub fn new_group(id: i64, name: &str) -> group::ActiveModel {
    group::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        member_count: Set(0),
        is_public: Set(false),
    }
}

/// 批量创建 `count` 个用户：user0、user1 ...，年龄从 20 开始递增
pub async fn seed_users(crud: &Crud<user::Entity>, count: usize) -> Vec<user::Model> {
    let models = (0..count)
        .map(|i| new_user(&format!("user{i}"), "member", 20 + i as i32))
        .collect();
    crud.bulk_create(models).await.unwrap()
}
