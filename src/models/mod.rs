pub mod curriculum;
pub mod paper;
pub mod question;
pub mod question_type;
pub mod quota;
