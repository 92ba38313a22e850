pub mod tag_routes;
pub mod url_routes;
