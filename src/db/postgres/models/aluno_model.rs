use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::Model;

/// A student record. Carries the usual base columns (id, timestamps, soft delete)
/// alongside the student's own fields.
#[cfg_attr(feature = "utoipa-schema", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aluno {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub nome: String,
    pub cpf: String,
    pub rg: String,
}

impl Model for Aluno {
    const TABLE_NAME: &'static str = "alunos";
}

impl Aluno {
    pub const COLUMNS: [&'static str; 7] = [
        "id",
        "created_at",
        "updated_at",
        "deleted_at",
        "nome",
        "cpf",
        "rg",
    ];

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
