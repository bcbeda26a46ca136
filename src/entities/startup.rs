use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "startups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub startup_id: i32,
    pub name: String,
    pub city: Option<String>,
    pub industry_id: Option<i32>, // null when the industry was absent or unmatched
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::industry::Entity",
        from = "Column::IndustryId",
        to = "super::industry::Column::IndustryId"
    )]
    Industry,
    #[sea_orm(has_many = "super::funding_round::Entity")]
    FundingRound,
}

impl Related<super::industry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Industry.def()
    }
}

impl Related<super::funding_round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FundingRound.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
