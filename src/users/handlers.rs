use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    Router,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    pipeline::{
        apply, handler_fn,
        middleware::{Auth, Cors, PathParam},
        ApiContext, HandlerFunc, HttpContext, MiddlewareFunc,
    },
    state::AppState,
    users::{
        dto::{is_valid_email, normalize_email, TokenResponse, UserRequest},
        usecase::UserUseCase,
    },
};

const USER_PATH: &str = "/users/:id";

pub fn router(state: &AppState) -> anyhow::Result<Router> {
    let cors = Cors::from_config(&state.config.cors)?;
    let cors: MiddlewareFunc = Arc::new(move |next: HandlerFunc| cors.add_response_header(next));
    let path_param = PathParam::new(USER_PATH)?;
    let path_param: MiddlewareFunc = Arc::new(move |next: HandlerFunc| path_param.parse(next));
    let auth = Auth::new(state.tokens.clone());
    let users = state.users.clone();

    let regist = apply(HttpContext::boxed, regist(users.clone()), &[cors.clone()]);
    let edit = apply(
        HttpContext::boxed,
        edit(users.clone(), &auth),
        &[cors.clone(), path_param],
    );
    let login = apply(HttpContext::boxed, login(users), &[cors]);

    Ok(Router::new()
        .route("/users", regist.into_route())
        .route("/users/*rest", edit.into_route())
        .route("/login", login.into_route()))
}

/// Writes 405 and returns false when the method is not `expected`.
fn allow_method(c: &mut dyn ApiContext, expected: Method) -> bool {
    if *c.request_method() == expected {
        return true;
    }
    debug!(method = %c.request_method(), %expected, "method not allowed");
    c.write_status_code(StatusCode::METHOD_NOT_ALLOWED);
    false
}

/// Decodes the JSON body, writing 400 when it is malformed.
fn decode_body(c: &mut dyn ApiContext) -> Option<UserRequest> {
    match serde_json::from_slice(c.request_body()) {
        Ok(req) => Some(req),
        Err(e) => {
            debug!(error = %e, "malformed request body");
            c.write_status_code(StatusCode::BAD_REQUEST);
            None
        }
    }
}

fn regist(users: Arc<dyn UserUseCase>) -> HandlerFunc {
    handler_fn(move |c| {
        let users = users.clone();
        Box::pin(async move {
            if !allow_method(c, Method::POST) {
                return Ok(());
            }
            let Some(req) = decode_body(c) else {
                return Ok(());
            };
            let user = req.into_model(None);
            if !is_valid_email(&user.email) {
                warn!(email = %user.email, "invalid email");
                c.write_status_code(StatusCode::BAD_REQUEST);
                return Ok(());
            }

            match users.regist(user, OffsetDateTime::now_utc()).await {
                Ok(()) => {
                    c.write_status_code(StatusCode::OK);
                    Ok(())
                }
                Err(e) => match e.root() {
                    AppError::UserAlreadyRegistered => {
                        warn!("email already registered");
                        c.write_status_code(StatusCode::BAD_REQUEST);
                        Ok(())
                    }
                    _ => Err(e.into()),
                },
            }
        })
    })
}

/// PUT updates and DELETE deletes the user named by the path.
fn edit(users: Arc<dyn UserUseCase>, auth: &Auth) -> HandlerFunc {
    let update = auth.verify_auth(update(users.clone()));
    let delete = auth.verify_auth(delete(users));
    handler_fn(move |c| {
        let (update, delete) = (update.clone(), delete.clone());
        Box::pin(async move {
            if *c.request_method() == Method::PUT {
                update(c).await
            } else if *c.request_method() == Method::DELETE {
                delete(c).await
            } else {
                debug!(method = %c.request_method(), "method not allowed");
                c.write_status_code(StatusCode::METHOD_NOT_ALLOWED);
                Ok(())
            }
        })
    })
}

/// Path id as a UUID, writing 400 when it is not one.
fn path_user_id(c: &mut dyn ApiContext) -> Option<Uuid> {
    match Uuid::parse_str(c.path_param()) {
        Ok(id) => Some(id),
        Err(_) => {
            debug!(param = %c.path_param(), "path id is not a uuid");
            c.write_status_code(StatusCode::BAD_REQUEST);
            None
        }
    }
}

fn update(users: Arc<dyn UserUseCase>) -> HandlerFunc {
    handler_fn(move |c| {
        let users = users.clone();
        Box::pin(async move {
            let Some(id) = path_user_id(c) else {
                return Ok(());
            };
            let Some(req) = decode_body(c) else {
                return Ok(());
            };

            match users
                .update(req.into_model(Some(id)), OffsetDateTime::now_utc())
                .await
            {
                Ok(()) => {
                    info!(user_id = %id, "user updated");
                    c.write_status_code(StatusCode::OK);
                    Ok(())
                }
                Err(e) => user_not_found_is_400(c, e),
            }
        })
    })
}

fn delete(users: Arc<dyn UserUseCase>) -> HandlerFunc {
    handler_fn(move |c| {
        let users = users.clone();
        Box::pin(async move {
            let Some(id) = path_user_id(c) else {
                return Ok(());
            };
            let Some(req) = decode_body(c) else {
                return Ok(());
            };

            match users.delete(req.into_model(Some(id))).await {
                Ok(()) => {
                    info!(user_id = %id, "user deleted");
                    c.write_status_code(StatusCode::OK);
                    Ok(())
                }
                Err(e) => user_not_found_is_400(c, e),
            }
        })
    })
}

fn user_not_found_is_400(c: &mut dyn ApiContext, e: AppError) -> anyhow::Result<()> {
    match e.root() {
        AppError::UserNotFound => {
            warn!("user not found");
            c.write_status_code(StatusCode::BAD_REQUEST);
            Ok(())
        }
        _ => Err(e.into()),
    }
}

fn login(users: Arc<dyn UserUseCase>) -> HandlerFunc {
    handler_fn(move |c| {
        let users = users.clone();
        Box::pin(async move {
            if !allow_method(c, Method::POST) {
                return Ok(());
            }
            let Some(req) = decode_body(c) else {
                return Ok(());
            };
            let email = normalize_email(&req.email);

            match users.authorize(&email, &req.password).await {
                Ok(token) => {
                    let body = serde_json::to_value(TokenResponse { token })?;
                    c.write_response_json(StatusCode::OK, body)
                }
                Err(e) => match e.root() {
                    AppError::NotFound | AppError::AuthorizeFailed => {
                        warn!(%email, "login rejected");
                        c.write_status_code(StatusCode::UNAUTHORIZED);
                        Ok(())
                    }
                    _ => Err(e.into()),
                },
            }
        })
    })
}
