pub mod admin;
pub mod machine;
pub mod pages;
pub mod profile;
pub mod sign_on;
pub mod system;
