pub mod aluno_model;
pub mod model;
