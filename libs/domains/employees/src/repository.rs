//! Employee persistence, following `outbox`'s free-function-over-`ConnectionTrait`
//! shape rather than a trait object repository: callers pass either a plain
//! connection or an in-flight transaction and the same functions work either way.

use crate::entity::{self, EmployeeStatus};
use crate::error::EmployeeError;
use crate::models::CreateEmployeeRequest;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

pub async fn insert<C: ConnectionTrait>(conn: &C, request: &CreateEmployeeRequest) -> Result<entity::Model, EmployeeError> {
    let now = Utc::now();
    let active = entity::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(request.name.clone()),
        email: Set(request.email.clone()),
        department: Set(request.department.clone()),
        title: Set(request.title.clone()),
        status: Set(EmployeeStatus::Onboarding),
        hired_at: Set(now.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    Ok(active.insert(conn).await?)
}

pub async fn find_by_id<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<entity::Model>, EmployeeError> {
    Ok(entity::Entity::find_by_id(id).one(conn).await?)
}

pub async fn find_by_email<C: ConnectionTrait>(conn: &C, email: &str) -> Result<Option<entity::Model>, EmployeeError> {
    Ok(entity::Entity::find()
        .filter(entity::Column::Email.eq(email))
        .one(conn)
        .await?)
}

/// Sets `department` to the value carried by the sync event, idempotently.
/// Returns [`EmployeeError::NotFound`] if the upstream system references an
/// employee that hasn't been created locally yet.
pub async fn update_department<C: ConnectionTrait>(conn: &C, id: Uuid, department: &str) -> Result<(), EmployeeError> {
    let model = find_by_id(conn, id).await?.ok_or(EmployeeError::NotFound(id))?;
    let mut active: entity::ActiveModel = model.into();
    active.department = Set(department.to_string());
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}

pub async fn mark_active<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), EmployeeError> {
    let model = find_by_id(conn, id).await?.ok_or(EmployeeError::NotFound(id))?;
    let mut active: entity::ActiveModel = model.into();
    active.status = Set(EmployeeStatus::Active);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}

pub async fn mark_onboarding<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), EmployeeError> {
    let model = find_by_id(conn, id).await?.ok_or(EmployeeError::NotFound(id))?;
    let mut active: entity::ActiveModel = model.into();
    active.status = Set(EmployeeStatus::Onboarding);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_find_round_trips() {
        let db = test_utils::TestDatabase::new().await;

        let request = CreateEmployeeRequest {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            department: "engineering".to_string(),
            title: "Principal Engineer".to_string(),
        };
        let created = insert(&db.connection, &request).await.unwrap();
        assert_eq!(created.status, EmployeeStatus::Onboarding);

        let found = find_by_id(&db.connection, created.id).await.unwrap().unwrap();
        assert_eq!(found.email, "ada@example.com");
    }

    #[tokio::test]
    async fn update_department_is_idempotent() {
        let db = test_utils::TestDatabase::new().await;

        let request = CreateEmployeeRequest {
            name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            department: "engineering".to_string(),
            title: "Rear Admiral".to_string(),
        };
        let created = insert(&db.connection, &request).await.unwrap();

        update_department(&db.connection, created.id, "research").await.unwrap();
        update_department(&db.connection, created.id, "research").await.unwrap();

        let found = find_by_id(&db.connection, created.id).await.unwrap().unwrap();
        assert_eq!(found.department, "research");
    }

    #[tokio::test]
    async fn update_department_unknown_employee_is_not_found() {
        let db = test_utils::TestDatabase::new().await;

        let result = update_department(&db.connection, Uuid::now_v7(), "research").await;
        assert!(matches!(result, Err(EmployeeError::NotFound(_))));
    }
}
