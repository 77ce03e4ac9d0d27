use std::io::Read;
use std::sync::{Arc, Mutex};

use iron::headers::{AccessControlAllowMethods, AccessControlAllowOrigin, ContentType, Headers};
use iron::method::Method;
use iron::{status, AfterMiddleware, Handler, IronResult, Plugin, Request, Response};
use params::{Map, Params, Value};
use router::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::database::FeedStore;
use crate::error::FeedError;
use crate::model::{LikeRequest, NewComment, NewPost, PostRef};
use crate::upload::Uploads;

/// Match a `Result` into its inner value, or return the JSON error
/// response for its `FeedError`. The second variant first converts the
/// error with the given function.
macro_rules! try_handler {
    ( $e:expr ) => {
        match $e {
            Ok(x) => x,
            Err(e) => return Ok(FeedError::to_response(&e)),
        }
    };
    ( $e:expr, $error:expr ) => {
        match $e {
            Ok(x) => x,
            Err(e) => return Ok(FeedError::to_response(&$error(e))),
        }
    };
}

/// Lock a `Mutex`. The store keeps no state in memory, so a lock
/// poisoned by a panicking request is still safe to use.
macro_rules! lock {
    ( $e:expr ) => { $e.lock().unwrap_or_else(::std::sync::PoisonError::into_inner) }
}

/// Resolve the `:id` parameter in the URI to a `PostRef`.
/// Anything that is neither a position nor a post id is `404 Not Found`.
/// If we could not obtain the parameter list, return `500 Internal Server Error`.
macro_rules! get_post_ref {
    ( $r:expr ) => {
        match $r.extensions.get::<Router>() {
            Some(router) => {
                match router.find("id").and_then(PostRef::parse) {
                    Some(post) => post,
                    None => {
                        return Ok(FeedError::NotFound("Post not found".to_string()).to_response())
                    }
                }
            }
            None => return Ok(Response::with(status::InternalServerError)),
        }
    }
}

#[derive(Clone)]
pub struct Handlers {
    pub index: IndexHandler,
    pub feed: FeedHandler,
    pub make_post: MakePostHandler,
    pub post: PostHandler,
    pub like: LikeHandler,
    pub comment: CommentHandler,
}

impl Handlers {
    pub fn new(store: FeedStore, uploads: Uploads, address: &str) -> Handlers {
        let store = Arc::new(Mutex::new(store));
        Handlers {
            index: IndexHandler { address: address.to_string() },
            feed: FeedHandler { store: store.clone() },
            make_post: MakePostHandler {
                store: store.clone(),
                uploads: uploads,
            },
            post: PostHandler { store: store.clone() },
            like: LikeHandler { store: store.clone() },
            comment: CommentHandler { store: store },
        }
    }
}

#[derive(Clone)]
pub struct IndexHandler {
    address: String,
}

impl Handler for IndexHandler {
    fn handle(&self, _: &mut Request) -> IronResult<Response> {
        respond(status::Ok, &json!({ "message": format!("server started on {}", self.address) }))
    }
}

#[derive(Clone)]
pub struct FeedHandler {
    store: Arc<Mutex<FeedStore>>,
}

impl Handler for FeedHandler {
    fn handle(&self, _: &mut Request) -> IronResult<Response> {
        let posts = try_handler!(lock!(self.store).list());
        respond(status::Ok, &posts)
    }
}

#[derive(Clone)]
pub struct MakePostHandler {
    store: Arc<Mutex<FeedStore>>,
    uploads: Uploads,
}

impl Handler for MakePostHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let map = try_handler!(req.get::<Params>(), |e: params::ParamsError| {
            FeedError::Validation(format!("Malformed request body: {}", e))
        });

        let mut new_post = NewPost {
            email: string_param(&map, "email"),
            body: string_param(&map, "body"),
            image: None,
        };
        try_handler!(new_post.validate());

        if let Some(&Value::File(ref file)) = map.find(&["image"]) {
            let named = file.filename.as_ref().map_or(false, |name| !name.is_empty());
            if named || file.size > 0 {
                let url = try_handler!(self.uploads.save(&file.path, file.filename.as_deref()));
                new_post.image = Some(url);
            }
        }

        let image = new_post.image.clone();
        let post = match lock!(self.store).append(new_post) {
            Ok(post) => post,
            Err(e) => {
                if let Some(url) = image {
                    self.uploads.discard(&url);
                }
                return Ok(e.to_response());
            }
        };
        info!("News post {} added by {}", post.id(), post.author().email());
        respond(status::Created, &json!({ "message": "News post added", "post": post }))
    }
}

#[derive(Clone)]
pub struct PostHandler {
    store: Arc<Mutex<FeedStore>>,
}

impl Handler for PostHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let post_ref = get_post_ref!(req);
        let post = try_handler!(lock!(self.store).get(post_ref));
        respond(status::Ok, &post)
    }
}

#[derive(Clone)]
pub struct LikeHandler {
    store: Arc<Mutex<FeedStore>>,
}

impl Handler for LikeHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let request: LikeRequest = try_handler!(read_json(req));
        let user_id = try_handler!(request.user_id());
        let post_ref = get_post_ref!(req);

        let likes = try_handler!(lock!(self.store).toggle_like(post_ref, user_id));
        info!("Like toggled on post {:?} by {}, now {} likes", post_ref, user_id, likes);
        respond(status::Ok, &json!({ "message": "Like toggled", "likes": likes }))
    }
}

#[derive(Clone)]
pub struct CommentHandler {
    store: Arc<Mutex<FeedStore>>,
}

impl Handler for CommentHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let new_comment: NewComment = try_handler!(read_json(req));
        try_handler!(new_comment.validate());
        let post_ref = get_post_ref!(req);

        let comment = try_handler!(lock!(self.store).add_comment(post_ref, new_comment));
        info!("Comment {} added to post {:?} by {}", comment.id(), post_ref, comment.user().username());
        respond(status::Created, &json!({ "message": "Comment added", "comment": comment }))
    }
}

pub struct JsonAfterMiddleware;

impl AfterMiddleware for JsonAfterMiddleware {
    fn after(&self, _: &mut Request, mut res: Response) -> IronResult<Response> {
        res.headers.set(ContentType::json());
        Ok(res)
    }
}

/// Lets the browser frontend call the API from another origin. Preflight
/// `OPTIONS` requests are answered here without reaching `inner`.
pub struct Cors<H> {
    inner: H,
}

impl<H: Handler> Cors<H> {
    pub fn new(inner: H) -> Cors<H> {
        Cors { inner: inner }
    }
}

impl<H: Handler> Handler for Cors<H> {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        if req.method == Method::Options {
            let mut res = Response::with(status::NoContent);
            allow_cross_origin(&mut res.headers);
            return Ok(res);
        }
        match self.inner.handle(req) {
            Ok(mut res) => {
                allow_cross_origin(&mut res.headers);
                Ok(res)
            }
            Err(mut e) => {
                allow_cross_origin(&mut e.response.headers);
                Err(e)
            }
        }
    }
}

fn allow_cross_origin(headers: &mut Headers) {
    headers.set(AccessControlAllowOrigin::Any);
    headers.set(AccessControlAllowMethods(vec![Method::Get, Method::Post, Method::Put, Method::Options]));
    headers.set_raw("Access-Control-Allow-Headers", vec![b"Content-Type".to_vec()]);
}

fn respond<T: Serialize>(code: status::Status, value: &T) -> IronResult<Response> {
    match serde_json::to_string(value) {
        Ok(payload) => Ok(Response::with((code, payload))),
        Err(e) => {
            error!("Failed to encode response: {}", e);
            Ok(Response::with(status::InternalServerError))
        }
    }
}

// An empty body decodes as `T::default()`, so missing fields surface as
// validation errors rather than parse errors.
fn read_json<T: DeserializeOwned + Default>(req: &mut Request) -> Result<T, FeedError> {
    let mut payload = String::new();
    req.body
        .read_to_string(&mut payload)
        .map_err(|e| FeedError::Validation(format!("Unreadable request body: {}", e)))?;
    if payload.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&payload).map_err(|e| FeedError::Validation(format!("Malformed JSON body: {}", e)))
}

fn string_param(map: &Map, key: &str) -> Option<String> {
    match map.find(&[key]) {
        Some(&Value::String(ref value)) => Some(value.clone()),
        _ => None,
    }
}
