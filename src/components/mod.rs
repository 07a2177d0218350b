pub mod history;
pub mod prompt;
pub mod tools;
