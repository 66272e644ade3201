use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(EmployeeStatus::Enum)
                    .values([EmployeeStatus::Onboarding, EmployeeStatus::Active, EmployeeStatus::Offboarded])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Employees::Table)
                    .if_not_exists()
                    .col(pk_uuid(Employees::Id))
                    .col(string(Employees::Name))
                    .col(string_uniq(Employees::Email))
                    .col(string(Employees::Department))
                    .col(string(Employees::Title))
                    .col(
                        ColumnDef::new(Employees::Status)
                            .enumeration(
                                EmployeeStatus::Enum,
                                [EmployeeStatus::Onboarding, EmployeeStatus::Active, EmployeeStatus::Offboarded],
                            )
                            .not_null()
                            .default("onboarding"),
                    )
                    .col(timestamp_with_time_zone(Employees::HiredAt))
                    .col(timestamp_with_time_zone(Employees::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Employees::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_employees_department")
                    .table(Employees::Table)
                    .col(Employees::Department)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER trg_employees_touch_updated_at
                BEFORE UPDATE ON employees
                FOR EACH ROW EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS trg_employees_touch_updated_at ON employees")
            .await?;

        manager
            .drop_table(Table::drop().table(Employees::Table).to_owned())
            .await?;

        manager.drop_type(Type::drop().name(EmployeeStatus::Enum).to_owned()).await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Employees {
    Table,
    Id,
    Name,
    Email,
    Department,
    Title,
    Status,
    HiredAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmployeeStatus {
    #[sea_orm(iden = "employee_status")]
    Enum,
    #[sea_orm(iden = "onboarding")]
    Onboarding,
    #[sea_orm(iden = "active")]
    Active,
    #[sea_orm(iden = "offboarded")]
    Offboarded,
}
