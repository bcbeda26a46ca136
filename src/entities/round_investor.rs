use sea_orm::entity::prelude::*;

/// Junction between funding rounds and investors.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "round_investors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub round_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub investor_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::funding_round::Entity",
        from = "Column::RoundId",
        to = "super::funding_round::Column::RoundId"
    )]
    FundingRound,
    #[sea_orm(
        belongs_to = "super::investor::Entity",
        from = "Column::InvestorId",
        to = "super::investor::Column::InvestorId"
    )]
    Investor,
}

impl Related<super::funding_round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FundingRound.def()
    }
}

impl Related<super::investor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Investor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
