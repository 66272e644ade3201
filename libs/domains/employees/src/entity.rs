//! SeaORM entity for the `employees` table.
//!
//! Mirrors `migration`'s `m20260102_000000_create_employees` column for
//! column, following `outbox::entity`'s `DeriveEntityModel` style rather than
//! hand-written `Statement`/`FromQueryResult` rows.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "employee_status")]
pub enum EmployeeStatus {
    #[sea_orm(string_value = "onboarding")]
    Onboarding,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "offboarded")]
    Offboarded,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
    pub title: String,
    pub status: EmployeeStatus,
    pub hired_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
