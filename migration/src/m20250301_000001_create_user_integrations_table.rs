use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 user_integrations 表 - 存储用户与第三方提供商的连接记录
        manager
            .create_table(
                Table::create()
                    .table(UserIntegrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserIntegrations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrations::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrations::Provider)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrations::AccessToken)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserIntegrations::RefreshToken).text())
                    .col(ColumnDef::new(UserIntegrations::ExpiresAt).timestamp())
                    .col(
                        ColumnDef::new(UserIntegrations::Scopes)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(UserIntegrations::Metadata).json())
                    .col(
                        ColumnDef::new(UserIntegrations::Status)
                            .string_len(20)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(UserIntegrations::ErrorMessage).text())
                    .col(
                        ColumnDef::new(UserIntegrations::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UserIntegrations::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // (user_id, provider) 唯一约束：每个用户每个提供商最多一条记录
        manager
            .create_index(
                Index::create()
                    .name("idx_user_integrations_user_provider")
                    .table(UserIntegrations::Table)
                    .col(UserIntegrations::UserId)
                    .col(UserIntegrations::Provider)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserIntegrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserIntegrations {
    Table,
    Id,
    UserId,
    Provider,
    AccessToken,
    RefreshToken,
    ExpiresAt,
    Scopes,
    Metadata,
    Status,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}
