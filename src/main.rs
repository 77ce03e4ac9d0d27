#[macro_use]
extern crate log;

mod config;
mod database;
mod error;
mod handlers;
mod model;
mod upload;

use std::path::Path;
use std::process;

use iron::prelude::Chain;
use iron::Iron;
use logger::Logger;
use mount::Mount;
use router::Router;
use staticfile::Static;

use crate::config::Config;
use crate::database::FeedStore;
use crate::handlers::*;
use crate::upload::Uploads;

// RUST_LOG=logger=info,newsfeed_backend=info newsfeed_backend > logs 2>&1 &
fn main() {
    env_logger::init();
    let (logger_before, logger_after) = Logger::new(None);

    let config = Config::load();
    let store = FeedStore::new(config.data_file.clone());
    let uploads = Uploads::new(config.upload_dir.clone(), &config.public_url);
    info!("Feed stored in {}, uploads in {}",
          store.path().display(),
          uploads.dir().display());

    let handlers = Handlers::new(store, uploads, &config.address);

    let mut chain = Chain::new(app(handlers, &config.upload_dir));
    chain.link_before(logger_before); // Should be first!
    chain.link_after(logger_after); // Should be last!

    info!("Server running on {}", config.address);
    if let Err(e) = Iron::new(chain).http(config.address.as_str()) {
        error!("Failed to bind {}: {}", config.address, e);
        process::exit(1);
    }
}

/// The feed routes, answering in JSON, with uploaded images served
/// as static files under `/uploads/`. Open to cross-origin callers.
fn app(handlers: Handlers, upload_dir: &Path) -> Cors<Mount> {
    let mut router = Router::new();
    router.get("/", handlers.index, "index");
    router.get("/news", handlers.feed.clone(), "feed");
    router.get("/news/", handlers.feed, "feed_slash");
    router.post("/news", handlers.make_post.clone(), "make_post");
    router.post("/news/", handlers.make_post, "make_post_slash");
    router.get("/news/:id", handlers.post, "post");
    router.put("/news/:id/like", handlers.like, "like");
    router.post("/news/:id/comment", handlers.comment, "comment");

    let mut api = Chain::new(router);
    api.link_after(JsonAfterMiddleware);

    let mut mount = Mount::new();
    mount.mount("/", api);
    mount.mount("/uploads/", Static::new(upload_dir));
    Cors::new(mount)
}
