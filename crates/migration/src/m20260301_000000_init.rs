//! Initial schema migration.
//!
//! - `recurring_transactions`: templates with a recurrence rule and the
//!   `last_charged` watermark
//! - `transactions`: ledger rows; `recurring_transaction_id` is a plain
//!   column, not a foreign key, so history survives template deletion

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum RecurringTransactions {
    Table,
    Id,
    AmountMinor,
    Category,
    Description,
    StartDate,
    LastCharged,
    RecurrenceKind,
    RecurrenceValue,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    AmountMinor,
    Category,
    Description,
    OccurredAt,
    RecurringTransactionId,
    Verified,
    CreatedAt,
    UpdatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Recurring transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(RecurringTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecurringTransactions::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::Category)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringTransactions::Description).string())
                    .col(
                        ColumnDef::new(RecurringTransactions::StartDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringTransactions::LastCharged).timestamp())
                    .col(
                        ColumnDef::new(RecurringTransactions::RecurrenceKind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::RecurrenceValue)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringTransactions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Ledger transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Category).string().not_null())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::RecurringTransactionId).blob())
                    .col(
                        ColumnDef::new(Transactions::Verified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecurringTransactions::Table).to_owned())
            .await?;
        Ok(())
    }
}
