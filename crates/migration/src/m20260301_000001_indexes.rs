use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum RecurringTransactions {
    Table,
    StartDate,
    Category,
    LastCharged,
}

#[derive(Iden)]
enum Transactions {
    Table,
    OccurredAt,
    Category,
    RecurringTransactionId,
    Verified,
}

/// Indexes on `transactions` come first, see `TRANSACTION_INDEXES`.
const INDEXES: [&str; 7] = [
    "idx-transactions-occurred_at",
    "idx-transactions-category",
    "idx-transactions-recurring_transaction_id",
    "idx-transactions-verified",
    "idx-recurring_transactions-start_date",
    "idx-recurring_transactions-category",
    "idx-recurring_transactions-last_charged",
];
const TRANSACTION_INDEXES: usize = 4;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let indexes = [
            Index::create()
                .name(INDEXES[0])
                .table(Transactions::Table)
                .col(Transactions::OccurredAt)
                .to_owned(),
            Index::create()
                .name(INDEXES[1])
                .table(Transactions::Table)
                .col(Transactions::Category)
                .to_owned(),
            Index::create()
                .name(INDEXES[2])
                .table(Transactions::Table)
                .col(Transactions::RecurringTransactionId)
                .to_owned(),
            Index::create()
                .name(INDEXES[3])
                .table(Transactions::Table)
                .col(Transactions::Verified)
                .to_owned(),
            Index::create()
                .name(INDEXES[4])
                .table(RecurringTransactions::Table)
                .col(RecurringTransactions::StartDate)
                .to_owned(),
            Index::create()
                .name(INDEXES[5])
                .table(RecurringTransactions::Table)
                .col(RecurringTransactions::Category)
                .to_owned(),
            Index::create()
                .name(INDEXES[6])
                .table(RecurringTransactions::Table)
                .col(RecurringTransactions::LastCharged)
                .to_owned(),
        ];

        for index in indexes {
            manager.create_index(index).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in &INDEXES[..TRANSACTION_INDEXES] {
            manager
                .drop_index(Index::drop().name(*name).table(Transactions::Table).to_owned())
                .await?;
        }
        for name in &INDEXES[TRANSACTION_INDEXES..] {
            manager
                .drop_index(
                    Index::drop()
                        .name(*name)
                        .table(RecurringTransactions::Table)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}
