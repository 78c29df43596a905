pub mod chat;
pub mod composer;
pub mod conversation;
pub mod fields;
pub mod media;
pub mod models;
pub mod payload;
pub mod response;
pub mod schema;
