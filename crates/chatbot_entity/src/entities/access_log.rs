use sea_orm::entity::prelude::*;

/// Append-only access record. Date and time are kept as separate strings.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tb_cl_user_log_acess")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub col_data: String,
    pub col_hora: String,
    pub col_ip: String,
    pub col_acao: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
