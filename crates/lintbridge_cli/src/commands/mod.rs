pub mod doctor;
pub mod lsp;
