pub mod curriculum;
pub mod health;
pub mod paper;
