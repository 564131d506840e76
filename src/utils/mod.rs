pub mod text;
pub mod token;
