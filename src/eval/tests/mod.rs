mod cache;
mod render;
