use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Industries::Table)
                    .if_not_exists()
                    // Surrogate ids are assigned by the normalizer, not the store.
                    .col(ColumnDef::new(Industries::IndustryId).integer().not_null().primary_key())
                    .col(ColumnDef::new(Industries::Name).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Investors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Investors::InvestorId).integer().not_null().primary_key())
                    .col(ColumnDef::new(Investors::Name).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Startups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Startups::StartupId).integer().not_null().primary_key())
                    .col(ColumnDef::new(Startups::Name).string().not_null())
                    .col(ColumnDef::new(Startups::City).string().null())
                    .col(ColumnDef::new(Startups::IndustryId).integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_startups_industry")
                            .from(Startups::Table, Startups::IndustryId)
                            .to(Industries::Table, Industries::IndustryId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FundingRounds::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FundingRounds::RoundId).integer().not_null().primary_key())
                    .col(ColumnDef::new(FundingRounds::StartupId).integer().not_null())
                    .col(ColumnDef::new(FundingRounds::Date).date().not_null())
                    .col(ColumnDef::new(FundingRounds::RoundType).string().not_null())
                    .col(ColumnDef::new(FundingRounds::AmountUsd).big_integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_funding_rounds_startup")
                            .from(FundingRounds::Table, FundingRounds::StartupId)
                            .to(Startups::Table, Startups::StartupId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoundInvestors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RoundInvestors::RoundId).integer().not_null())
                    .col(ColumnDef::new(RoundInvestors::InvestorId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(RoundInvestors::RoundId)
                            .col(RoundInvestors::InvestorId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_investors_round")
                            .from(RoundInvestors::Table, RoundInvestors::RoundId)
                            .to(FundingRounds::Table, FundingRounds::RoundId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_investors_investor")
                            .from(RoundInvestors::Table, RoundInvestors::InvestorId)
                            .to(Investors::Table, Investors::InvestorId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse dependency order so foreign keys never dangle.
        manager
            .drop_table(Table::drop().table(RoundInvestors::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FundingRounds::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Startups::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Investors::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Industries::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Industries {
    Table,
    IndustryId,
    Name,
}

#[derive(DeriveIden)]
enum Investors {
    Table,
    InvestorId,
    Name,
}

#[derive(DeriveIden)]
enum Startups {
    Table,
    StartupId,
    Name,
    City,
    IndustryId,
}

#[derive(DeriveIden)]
enum FundingRounds {
    Table,
    RoundId,
    StartupId,
    Date,
    RoundType,
    AmountUsd,
}

#[derive(DeriveIden)]
enum RoundInvestors {
    Table,
    RoundId,
    InvestorId,
}
