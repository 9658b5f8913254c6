pub mod timeline_cache;
