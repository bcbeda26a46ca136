use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "investors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub investor_id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::round_investor::Entity")]
    RoundInvestor,
}

impl Related<super::round_investor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundInvestor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
