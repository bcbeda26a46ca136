use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "funding_rounds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub round_id: i32,
    pub startup_id: i32,
    pub date: Date,
    pub round_type: String,
    pub amount_usd: Option<i64>, // BIGINT
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::startup::Entity",
        from = "Column::StartupId",
        to = "super::startup::Column::StartupId"
    )]
    Startup,
    #[sea_orm(has_many = "super::round_investor::Entity")]
    RoundInvestor,
}

impl Related<super::startup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Startup.def()
    }
}

impl Related<super::round_investor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundInvestor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
