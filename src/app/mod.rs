pub mod auth;
pub mod thumbnails;
pub mod videos;
