pub mod bookmark_service;
pub mod tag_parser;
pub mod title_resolver;

pub use bookmark_service::{BookmarkError, BookmarkService, DeleteReport, RetagReport, TagWithUrls};
pub use tag_parser::TagSyntax;
pub use title_resolver::{HttpTitleResolver, StaticTitleResolver, TitleResolver};
